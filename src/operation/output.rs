use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel};
use crate::operation::core::{InputSocket, InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Kind of final output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Final render result. Always produced.
    #[default]
    Composite,
    /// Preview output. Skipped when rendering.
    Viewer,
}

/// Terminal operation collecting a colour image.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputOperation {
    kind: OutputKind,
    label: String,
    priority: u8,
}

/// Highest accepted render priority.
pub const MAX_RENDER_PRIORITY: u8 = 9;

impl OutputOperation {
    /// Composite output labelled `"Composite"`.
    pub fn composite() -> Self {
        Self::new(OutputKind::Composite, "Composite")
    }

    /// Viewer output labelled `"Viewer"`.
    pub fn viewer() -> Self {
        Self::new(OutputKind::Viewer, "Viewer")
    }

    /// Output of `kind` labelled `label`, priority 0.
    pub fn new(kind: OutputKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            priority: 0,
        }
    }

    /// Scheduling priority; values above 9 are clamped.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_RENDER_PRIORITY);
        self
    }

    /// Output kind.
    pub fn kind(&self) -> OutputKind {
        self.kind
    }
}

impl Operation for OutputOperation {
    fn name(&self) -> &str {
        match self.kind {
            OutputKind::Composite => "Composite",
            OutputKind::Viewer => "Viewer",
        }
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::color([0.0; 4])]
    }

    fn output_type(&self) -> DataType {
        DataType::Color
    }

    fn is_output(&self, rendering: bool) -> bool {
        match self.kind {
            OutputKind::Composite => true,
            OutputKind::Viewer => !rendering,
        }
    }

    fn output_name(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn render_priority(&self) -> u8 {
        self.priority
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        *out = inputs.read(0, x, y, sampler);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/output.rs"]
mod tests;
