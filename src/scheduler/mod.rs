pub(crate) mod work_scheduler;
