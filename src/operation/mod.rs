pub(crate) mod blur;
pub(crate) mod buffer_io;
pub(crate) mod constant;
pub(crate) mod core;
pub(crate) mod downsample;
pub(crate) mod flip;
pub(crate) mod graph;
pub(crate) mod id_mask;
pub(crate) mod image_input;
pub(crate) mod inputs;
pub(crate) mod math;
pub(crate) mod mix;
pub(crate) mod output;
pub(crate) mod resample;
pub(crate) mod shape_mask;
pub(crate) mod transform;
