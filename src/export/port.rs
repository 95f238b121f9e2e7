//! Deterministic port assignment.

/// Ports reserved for each process type
pub const PORT_BLOCK_SIZE: u32 = 100;

/// Port for instance `instance` (1-based) of the process type at `ordinal`
/// (0-based, declaration order).
///
/// Each process type owns a block of [`PORT_BLOCK_SIZE`] ports starting at
/// `base + ordinal * PORT_BLOCK_SIZE`. A type scaled past the block size
/// spills into the next type's block.
pub fn port_for(ordinal: usize, instance: u32, base: u32) -> u32 {
    let ordinal = u32::try_from(ordinal).unwrap_or(u32::MAX);
    base.saturating_add(ordinal.saturating_mul(PORT_BLOCK_SIZE))
        .saturating_add(instance.saturating_sub(1))
}
