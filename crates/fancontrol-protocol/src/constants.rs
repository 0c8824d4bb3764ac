//! Protocol constants
//!
//! Single-byte opcodes shared by the host and the controller firmware.

// ============================================================================
// Control Codes
// ============================================================================

/// Opens an exchange (host → device).
pub const HELLO: u8 = 1;
/// Handshake acknowledgement (device → host).
pub const ACK: u8 = 2;
/// Receipt confirmation. Sent by the device after a SET payload and by the
/// host after a GET payload.
pub const RCVD: u8 = 3;
/// End of transmission. Reserved by the firmware, never expected by the host.
pub const END: u8 = 6;
/// The device rejected the current exchange.
pub const ERROR: u8 = 7;

// ============================================================================
// Command Codes (host → device)
// ============================================================================

/// Set the target temperature of a channel.
pub const CMD_SET_TARGET: u8 = 64;
/// Set the manual output (PWM duty) of a channel.
pub const CMD_SET_OUTPUT: u8 = 65;
/// Set the proportional gain.
pub const CMD_SET_KP: u8 = 66;
/// Set the integral gain.
pub const CMD_SET_KI: u8 = 67;
/// Set the derivative gain.
pub const CMD_SET_KD: u8 = 68;
/// Set the control mode.
pub const CMD_SET_MODE: u8 = 69;
/// Read temperature, target, fan speed and output.
pub const CMD_GET_STATUS: u8 = 70;
/// Read mode and PID gains.
pub const CMD_GET_SETTINGS: u8 = 71;

// ============================================================================
// Encoding
// ============================================================================

/// Bias added to signed 16-bit values on the wire.
pub const I16_BIAS: i32 = 32768;

/// Number of 16-bit fields in every GET payload.
pub const GET_FIELD_COUNT: usize = 4;

/// Returns a human-readable name for a control or command code.
pub fn opcode_name(code: u8) -> &'static str {
    match code {
        HELLO => "HELLO",
        ACK => "ACK",
        RCVD => "RCVD",
        END => "END",
        ERROR => "ERROR",
        CMD_SET_TARGET => "SET_TARGET",
        CMD_SET_OUTPUT => "SET_OUTPUT",
        CMD_SET_KP => "SET_KP",
        CMD_SET_KI => "SET_KI",
        CMD_SET_KD => "SET_KD",
        CMD_SET_MODE => "SET_MODE",
        CMD_GET_STATUS => "GET_STATUS",
        CMD_GET_SETTINGS => "GET_SETTINGS",
        _ => "UNKNOWN",
    }
}
