use crate::adapter::{ObjectCache, TileSelection, TileSelectionAdapter};
use crate::codec::{FrameDecoder, FrameSink, StreamInfo};
use crate::naming;
use crate::segment;
use bytes::Bytes;
use repo_lib::{Name, RepoResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// For frame index N, the tiles for tile groups up to
/// N + TILE_GROUP_ADVANCE must be pre-fetched, since a single frame's
/// decode may reference several tile groups ahead.
pub const TILE_GROUP_ADVANCE: i64 = 5;

/// While processing frame N, keep outstanding requests for all
/// non-tile objects up to N + FRAME_PIPELINE_SIZE, and for all tile
/// objects up to N + FRAME_PIPELINE_SIZE + TILE_GROUP_ADVANCE.
pub const FRAME_PIPELINE_SIZE: i64 = 30;

/// What the network client eventually delivers for a requested name.
/// A timeout or negative-ack is the only way an outstanding request is
/// ever retired.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Object { name: Name, payload: Bytes },
    Timeout { name: Name },
    Nack { name: Name },
}

/// The external name-tree client. Fire-and-forget: the answer arrives
/// later as a FetchEvent on the scheduler's channel. There is no
/// cancellation primitive for an in-flight request.
pub trait InterestClient: Send + Sync {
    fn express_interest(&self, name: &Name);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    AwaitingHeader,
    Streaming,
    Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchSummary {
    pub frames_emitted: u64,
    pub info: Option<StreamInfo>,
}

/// Windowed fetch/reassembly scheduler for one stream.
///
/// `handle_event` and `tick` are synchronous and not reentrant; both
/// must run on a single processing context (the async `run` loop, or a
/// test driving them directly). No internal lock enforces this.
pub struct FetchScheduler<D: FrameDecoder, S: FrameSink> {
    client: Arc<dyn InterestClient>,
    decoder: D,
    sink: S,
    stream_prefix: Name,
    header_name: Name,
    state: FetchState,
    objects: ObjectCache,
    selection: TileSelection,
    info: Option<StreamInfo>,
    /// Decode cursor: the frame most recently emitted, -1 before the
    /// first. Advances by exactly one per successful decode.
    frame_index: i64,
    /// Last frame index believed to exist, inferred from non-tile
    /// timeouts/nacks. Once set it only ever decreases.
    final_frame_index: Option<i64>,
    max_requested_frame: i64,
    max_requested_tile_group: i64,
    frames_emitted: u64,
}

impl<D: FrameDecoder, S: FrameSink> FetchScheduler<D, S> {
    /// An empty `selection` means "all tiles": only non-tile objects
    /// are fetched until the first decode reveals the grid dimensions,
    /// then fetching restarts for the full selection.
    pub fn new(
        client: Arc<dyn InterestClient>,
        decoder: D,
        sink: S,
        stream_prefix: Name,
        selection: TileSelection,
    ) -> Self {
        let header_name = naming::file_header_name(&stream_prefix);
        Self {
            client,
            decoder,
            sink,
            stream_prefix,
            header_name,
            state: FetchState::AwaitingHeader,
            objects: ObjectCache::new(),
            selection,
            info: None,
            frame_index: -1,
            final_frame_index: None,
            max_requested_frame: -1,
            max_requested_tile_group: -1,
            frames_emitted: 0,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == FetchState::Finished
    }

    pub fn frame_index(&self) -> i64 {
        self.frame_index
    }

    pub fn final_frame_index(&self) -> Option<i64> {
        self.final_frame_index
    }

    pub fn max_requested_frame(&self) -> i64 {
        self.max_requested_frame
    }

    pub fn max_requested_tile_group(&self) -> i64 {
        self.max_requested_tile_group
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    pub fn selection(&self) -> &TileSelection {
        &self.selection
    }

    pub fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Issue the single request for the stream header object.
    pub fn start(&mut self) {
        debug!("fetching stream header {}", self.header_name);
        self.client.express_interest(&self.header_name);
    }

    /// Dispatch one network arrival/timeout. Must run on the same
    /// context as `tick`.
    pub fn handle_event(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Object { name, payload } => {
                let is_header = name == self.header_name;
                self.objects.insert(&name, payload);
                if is_header && self.state == FetchState::AwaitingHeader {
                    self.on_file_header();
                }
            }
            FetchEvent::Timeout { name } | FetchEvent::Nack { name } => {
                self.on_negative(name);
            }
        }
    }

    fn on_file_header(&mut self) {
        let header = match self.objects.get(&self.header_name) {
            Some(header) => header.clone(),
            None => return,
        };
        match self.decoder.start_read(&header) {
            Ok(info) => {
                info!(
                    "stream header {}: {}x{} @{}/{}",
                    self.header_name,
                    info.width,
                    info.height,
                    info.frame_rate_numerator,
                    info.frame_rate_denominator
                );
                self.info = Some(info);
                self.state = FetchState::Streaming;
                self.request_new_objects();
            }
            Err(e) => {
                error!("failed to read stream header {}: {}", self.header_name, e);
                self.state = FetchState::Finished;
            }
        }
    }

    fn on_negative(&mut self, name: Name) {
        if name == self.header_name {
            if self.state == FetchState::AwaitingHeader {
                warn!("timeout/nack fetching stream header {}", name);
                self.state = FetchState::Finished;
            }
            return;
        }

        if let Some(index) = naming::non_tile_index(&self.stream_prefix, &name) {
            if index == 0 {
                warn!("timeout/nack fetching the first frame {}", name);
                self.state = FetchState::Finished;
                return;
            }
            let candidate = index - 1;
            let updated = match self.final_frame_index {
                None => candidate,
                // A later negative signal about an earlier index wins.
                Some(current) => current.min(candidate),
            };
            if self.final_frame_index != Some(updated) {
                debug!("final frame index bounded to {}", updated);
                self.final_frame_index = Some(updated);
            }
            // We may already have all the needed objects.
            self.tick();
        }
        // Tile timeouts carry no completion signal.
    }

    /// One readiness-check/decode/emit/refill step. Returns without
    /// state change when the next frame is not ready. A decode failure
    /// leaves cursor and pipeline untouched, so the next tick repeats
    /// the identical attempt (a deliberate stall; see DESIGN.md).
    pub fn tick(&mut self) {
        if self.state != FetchState::Streaming {
            return;
        }
        let next_frame = self.frame_index + 1;
        if !self.can_decode_frame(next_frame) {
            return;
        }

        let selection_was_sentinel = self.selection.is_empty();
        let non_tile_name = naming::non_tile_name(&self.stream_prefix, next_frame);
        let non_tile = match self.objects.get(&non_tile_name) {
            Some(bytes) => bytes,
            None => return,
        };
        let (first_tile_group, frame_bytes) = match segment::split_non_tile(non_tile) {
            Ok(split) => split,
            Err(e) => {
                warn!("bad non-tile segment for frame {}: {}", next_frame, e);
                return;
            }
        };

        let decode_result = {
            let mut adapter = TileSelectionAdapter::new(
                &mut self.selection,
                &self.objects,
                &self.stream_prefix,
                first_tile_group,
            );
            self.decoder.decode_frame(frame_bytes, &mut adapter)
        };
        if let Err(e) = decode_result {
            warn!("failed to decode frame {}: {}", next_frame, e);
            return;
        }

        if selection_was_sentinel {
            // The decode just revealed the tile grid. No frame is
            // emitted; re-read the already-fetched header to reset the
            // decoder and restart fetching for the resolved selection.
            if self.selection.is_empty() {
                warn!("selection still empty after decoding frame {}", next_frame);
                return;
            }
            info!(
                "tile selection resolved to {} tiles; restarting fetch",
                self.selection.len()
            );
            let header = match self.objects.get(&self.header_name) {
                Some(header) => header.clone(),
                None => {
                    warn!("stream header missing during selection restart");
                    return;
                }
            };
            if let Err(e) = self.decoder.start_read(&header) {
                error!("failed to re-read stream header: {}", e);
                self.state = FetchState::Finished;
                return;
            }
            self.request_new_objects();
            return;
        }

        for frame in self.decoder.take_frames() {
            if let Err(e) = self.sink.write_frame(&frame) {
                warn!("sink rejected frame {}: {}", next_frame, e);
            }
        }
        self.frame_index = next_frame;
        self.frames_emitted += 1;
        debug!("processed frame {}", self.frame_index);

        if let Some(final_index) = self.final_frame_index {
            if self.frame_index >= final_index {
                info!(
                    "finished at frame {} ({} frames emitted)",
                    self.frame_index, self.frames_emitted
                );
                self.state = FetchState::Finished;
                return;
            }
        }

        self.request_new_objects();
    }

    /// Whether the non-tile object for `start_index` and every
    /// selected tile for tile groups [first, first + advance] (clipped
    /// to the final frame index) have arrived.
    fn can_decode_frame(&self, start_index: i64) -> bool {
        let non_tile_name = naming::non_tile_name(&self.stream_prefix, start_index);
        let non_tile = match self.objects.get(&non_tile_name) {
            Some(bytes) => bytes,
            None => return false,
        };

        if self.selection.is_empty() {
            // Sentinel: decode anyway so the grid dimensions get
            // reported.
            return true;
        }

        let first_tile_group = match segment::first_tile_group_index(non_tile) {
            Ok(index) => index as i64,
            // Let the decode path surface the malformed segment.
            Err(_) => return true,
        };
        let mut max_tile_group = first_tile_group + TILE_GROUP_ADVANCE;
        if let Some(final_index) = self.final_frame_index {
            if final_index < first_tile_group {
                return true;
            }
            if final_index < max_tile_group {
                // The stream ends before the advance window.
                max_tile_group = final_index;
            }
        }

        for tile_group in first_tile_group..=max_tile_group {
            for &(row, col) in &self.selection {
                let name = naming::tile_name(&self.stream_prefix, tile_group, row, col);
                if !self.objects.contains(&name) {
                    return false;
                }
            }
        }
        true
    }

    /// Raise the request high-water marks: non-tile objects up to
    /// cursor + 1 + FRAME_PIPELINE_SIZE, selected tiles up to
    /// cursor + 1 + FRAME_PIPELINE_SIZE + TILE_GROUP_ADVANCE. Tile
    /// requests are skipped entirely while the selection sentinel is
    /// unresolved.
    fn request_new_objects(&mut self) {
        let target_frame = self.frame_index + 1 + FRAME_PIPELINE_SIZE;
        while self.max_requested_frame < target_frame {
            self.max_requested_frame += 1;
            self.client.express_interest(&naming::non_tile_name(
                &self.stream_prefix,
                self.max_requested_frame,
            ));
        }

        if self.selection.is_empty() {
            return;
        }

        let target_tile_group = self.frame_index + 1 + FRAME_PIPELINE_SIZE + TILE_GROUP_ADVANCE;
        while self.max_requested_tile_group < target_tile_group {
            self.max_requested_tile_group += 1;
            for &(row, col) in &self.selection {
                self.client.express_interest(&naming::tile_name(
                    &self.stream_prefix,
                    self.max_requested_tile_group,
                    row,
                    col,
                ));
            }
        }
    }

    /// Drive the stream to completion: issue the header request, then
    /// await arrivals and periodic poll ticks on one task until the
    /// scheduler reaches Finished. Stopping early is just dropping the
    /// future; in-flight requests cannot be cancelled anyway.
    pub async fn run(mut self, mut events: mpsc::Receiver<FetchEvent>) -> RepoResult<FetchSummary> {
        self.start();
        let mut poll = tokio::time::interval(Duration::from_millis(10));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while self.state != FetchState::Finished {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("event channel closed; stopping fetch");
                        self.state = FetchState::Finished;
                    }
                },
                _ = poll.tick() => {}
            }
            self.tick();
        }

        Ok(FetchSummary {
            frames_emitted: self.frames_emitted,
            info: self.info,
        })
    }
}
