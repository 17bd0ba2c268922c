pub(crate) mod memory_buffer;
pub(crate) mod sampler;
