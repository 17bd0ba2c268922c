use crate::foundation::core::Resolution;
use crate::foundation::error::{TilecompError, TilecompResult};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Order in which the chunks of one group are handed to the worker pool.
///
/// Ordering only affects which pixels appear first. Correctness never depends on it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrder {
    /// Row-major, top-left first.
    TopDown,
    /// Nearest to the frame centre first.
    #[default]
    CenterOut,
    /// Nearest to one of the four rule-of-thirds intersections first.
    RuleOfThirds,
    /// Nearest to one of [`CompositorConfig::hotspots`] first.
    Hotspots,
}

/// Execution configuration for one compositor run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositorConfig {
    /// Chunk edge length in pixels.
    pub chunk_size: u32,
    /// Derive the chunk size per group from `target_chunk_pixels` and the worker count.
    pub auto_chunk_size: bool,
    /// Pixel count per chunk aimed for when `auto_chunk_size` is set.
    pub target_chunk_pixels: u32,
    /// Worker threads. `None` uses the available hardware parallelism.
    pub threads: Option<usize>,
    /// RAM held by cached chunk buffers before eviction to scratch storage kicks in.
    pub memory_budget_bytes: usize,
    /// Parent directory for eviction scratch files. Defaults to the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Chunk scheduling order within a group.
    pub chunk_order: ChunkOrder,
    /// Normalized (`0..1`) hotspot positions used by [`ChunkOrder::Hotspots`].
    pub hotspots: Vec<[f32; 2]>,
    /// Resolution offered to output operations that have nothing else to follow.
    pub render_size: Resolution,
    /// Abort the run on the first chunk fault instead of finishing it with partial data.
    pub fail_fast: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            auto_chunk_size: false,
            target_chunk_pixels: 65_536,
            threads: None,
            memory_budget_bytes: 512 * 1024 * 1024,
            scratch_dir: None,
            chunk_order: ChunkOrder::CenterOut,
            hotspots: Vec::new(),
            render_size: Resolution::new(1920, 1080),
            fail_fast: false,
        }
    }
}

/// Smallest chunk edge the automatic sizing will produce.
pub(crate) const MIN_AUTO_CHUNK_SIZE: u32 = 16;

impl CompositorConfig {
    /// Parse a config from JSON. Missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> TilecompResult<Self> {
        let cfg: CompositorConfig = serde_json::from_str(s)
            .map_err(|e| TilecompError::serde(format!("parse compositor config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> TilecompResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            TilecompError::validation(format!("open compositor config '{}': {e}", path.display()))
        })?;
        let cfg: CompositorConfig = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| TilecompError::serde(format!("parse compositor config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings no run can honour.
    pub fn validate(&self) -> TilecompResult<()> {
        if self.chunk_size == 0 {
            return Err(TilecompError::validation("config 'chunk_size' must be >= 1"));
        }
        if self.auto_chunk_size && self.target_chunk_pixels == 0 {
            return Err(TilecompError::validation(
                "config 'target_chunk_pixels' must be >= 1 when 'auto_chunk_size' is set",
            ));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(TilecompError::validation(
                "config 'threads' must be >= 1 when set",
            ));
        }
        if self.render_size.is_zero() {
            return Err(TilecompError::validation(format!(
                "config 'render_size' must be non-zero, got {}",
                self.render_size
            )));
        }
        for (i, [x, y]) in self.hotspots.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() {
                return Err(TilecompError::validation(format!(
                    "config 'hotspots[{i}]' must be finite"
                )));
            }
        }
        Ok(())
    }

    /// Worker count this config resolves to on the current machine.
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Chunk edge for a group of the given resolution.
    ///
    /// With `auto_chunk_size` the edge starts at `sqrt(target_chunk_pixels)` and is halved (never
    /// below 16) until the group splits into at least one chunk per worker.
    pub fn chunk_size_for(&self, resolution: Resolution) -> u32 {
        if !self.auto_chunk_size {
            return self.chunk_size;
        }
        let threads = self.effective_threads() as u64;
        let mut edge = (f64::from(self.target_chunk_pixels).sqrt() as u32).max(MIN_AUTO_CHUNK_SIZE);
        loop {
            let cx = u64::from(resolution.width.div_ceil(edge));
            let cy = u64::from(resolution.height.div_ceil(edge));
            if cx * cy >= threads || edge <= MIN_AUTO_CHUNK_SIZE {
                return edge;
            }
            edge = (edge / 2).max(MIN_AUTO_CHUNK_SIZE);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/compositor.rs"]
mod tests;
