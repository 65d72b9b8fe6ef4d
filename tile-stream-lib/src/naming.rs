use repo_lib::Name;

pub const FILE_HEADER_COMPONENT: &str = "fileheader";
pub const NON_TILE_COMPONENT: &str = "nontile";
pub const TILE_COMPONENT: &str = "tile";

/// `{prefix}/fileheader`
pub fn file_header_name(prefix: &Name) -> Name {
    prefix.append(FILE_HEADER_COMPONENT)
}

/// `{prefix}/nontile/{frame_index}`
pub fn non_tile_name(prefix: &Name, frame_index: i64) -> Name {
    prefix
        .append(NON_TILE_COMPONENT)
        .append(frame_index.to_string())
}

/// `{prefix}/tile/{tile_group}/{row}/{col}`
pub fn tile_name(prefix: &Name, tile_group: i64, row: u32, col: u32) -> Name {
    prefix
        .append(TILE_COMPONENT)
        .append(tile_group.to_string())
        .append(row.to_string())
        .append(col.to_string())
}

/// The frame index of a non-tile object name, or None when the name is
/// not under `{prefix}/nontile` or its index component does not parse.
pub fn non_tile_index(prefix: &Name, name: &Name) -> Option<i64> {
    let non_tile_prefix = prefix.append(NON_TILE_COMPONENT);
    if !non_tile_prefix.is_prefix_of(name) {
        return None;
    }
    name.component(non_tile_prefix.component_count())?
        .parse()
        .ok()
}
