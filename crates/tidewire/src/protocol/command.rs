//! Reserved command codes owned by the engine.

/// Keepalive probe; answered with [`CMD_PING_ACK`].
pub const CMD_PING: u32 = 0x0100_0001;

/// Keepalive acknowledgement; accepted and discarded.
pub const CMD_PING_ACK: u32 = 0x0100_0002;

/// Carries an RPC call whose method name trails the body.
pub const CMD_RPC_METHOD: u32 = 0x0100_0003;

/// Carries an RPC failure text back to the caller.
pub const CMD_RPC_ERROR: u32 = 0x0100_0004;

/// Every code user handlers may never claim.
pub const RESERVED_COMMANDS: [u32; 4] = [CMD_PING, CMD_PING_ACK, CMD_RPC_METHOD, CMD_RPC_ERROR];

/// Returns `true` when `cmd` is owned by the engine.
pub fn is_reserved(cmd: u32) -> bool {
    RESERVED_COMMANDS.contains(&cmd)
}
