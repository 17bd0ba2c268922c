pub(crate) mod chunk_order;
pub(crate) mod group;
pub(crate) mod observer;
pub(crate) mod run;
pub(crate) mod system;
