use bytes::Bytes;
use repo_lib::RepoResult;
use std::io::Write;

/// Codec-init parameters parsed from the stream header object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub fourcc: [u8; 4],
    pub width: u32,
    pub height: u32,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,
}

/// Buffer matrix for one tile group. All slots start empty; the tile
/// source binds the slots it has data for and leaves the rest to the
/// codec's own fallback handling.
pub struct TileGrid {
    n_rows: usize,
    n_cols: usize,
    slots: Vec<Option<Bytes>>,
}

impl TileGrid {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            slots: vec![None; n_rows * n_cols],
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn set(&mut self, row: usize, col: usize, data: Bytes) {
        self.slots[row * self.n_cols + col] = Some(data);
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Bytes> {
        self.slots[row * self.n_cols + col].as_ref()
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Supplies tile data to the decoder. The decoder invokes this once
/// per tile group the frame references.
pub trait TileSource {
    fn fill_tile_buffers(&mut self, n_rows: usize, n_cols: usize, buffers: &mut TileGrid)
        -> bool;
}

/// The external media codec, reduced to the seam this crate needs.
/// Implementations wrap a real decoder; tests use a deterministic mock.
pub trait FrameDecoder {
    /// Parse the codec-init descriptor and reset any previous decode
    /// state (re-invoked when the tile selection resolves mid-stream).
    fn start_read(&mut self, file_header: &[u8]) -> RepoResult<StreamInfo>;

    /// Decode one frame's compressed bytes, pulling tile data through
    /// `tiles`.
    fn decode_frame(&mut self, frame_bytes: &[u8], tiles: &mut dyn TileSource) -> RepoResult<()>;

    /// Drain the raster frames the last decode produced.
    fn take_frames(&mut self) -> Vec<RasterFrame>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// Receives decoded frames in decode order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RasterFrame) -> RepoResult<()>;
}

/// Writes raw frame bytes to any `io::Write`, e.g. a rawvideo file.
pub struct RawSink<W: Write>(pub W);

impl<W: Write> FrameSink for RawSink<W> {
    fn write_frame(&mut self, frame: &RasterFrame) -> RepoResult<()> {
        self.0.write_all(&frame.data)?;
        Ok(())
    }
}
