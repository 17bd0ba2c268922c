pub(crate) mod desc;
pub(crate) mod registry;
