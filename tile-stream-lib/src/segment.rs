use repo_lib::{RepoError, RepoResult};

/// Big-endian u32 prefixed to every non-tile segment: the first tile
/// group index the frame will reference.
pub const TILE_GROUP_INDEX_LEN: usize = 4;

/// Fixed per-frame header following the tile group index (frame size
/// plus presentation timestamp in the container format).
pub const FRAME_HEADER_LEN: usize = 12;

/// The first tile group index for the frame.
pub fn first_tile_group_index(non_tile: &[u8]) -> RepoResult<u32> {
    if non_tile.len() < TILE_GROUP_INDEX_LEN {
        return Err(RepoError::HeaderParse(format!(
            "non-tile segment is {} bytes, need at least {}",
            non_tile.len(),
            TILE_GROUP_INDEX_LEN
        )));
    }
    Ok(u32::from_be_bytes([
        non_tile[0],
        non_tile[1],
        non_tile[2],
        non_tile[3],
    ]))
}

/// Split a non-tile segment into its first tile group index and the
/// compressed frame bytes, skipping the fixed frame header.
pub fn split_non_tile(non_tile: &[u8]) -> RepoResult<(u32, &[u8])> {
    let first_tile_group = first_tile_group_index(non_tile)?;
    let skip = TILE_GROUP_INDEX_LEN + FRAME_HEADER_LEN;
    if non_tile.len() < skip {
        return Err(RepoError::HeaderParse(format!(
            "non-tile segment is {} bytes, need at least {}",
            non_tile.len(),
            skip
        )));
    }
    Ok((first_tile_group, &non_tile[skip..]))
}

/// Assemble a non-tile segment (writer and test side).
pub fn encode_non_tile(
    first_tile_group: u32,
    frame_header: &[u8; FRAME_HEADER_LEN],
    frame_bytes: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(TILE_GROUP_INDEX_LEN + FRAME_HEADER_LEN + frame_bytes.len());
    out.extend_from_slice(&first_tile_group.to_be_bytes());
    out.extend_from_slice(frame_header);
    out.extend_from_slice(frame_bytes);
    out
}
