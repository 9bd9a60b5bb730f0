//! SETTINGS frame payload (RFC 7540 §6.5) plus the locally-applied tuning
//! knobs layered on top, grounded in
//! `rama-http-core/src/h2/frame/settings.rs`'s constants and in
//! `galay-http/kernel/http/Http2Params.hpp`'s documented defaults.

use crate::error::Error;

pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: u32 = 4096;
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;
pub const DEFAULT_MAX_HEADER_LIST_SIZE: u32 = 8192;
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;
pub const DEFAULT_ENABLE_PUSH: bool = false;

pub const MAX_INITIAL_WINDOW_SIZE: u32 = (1 << 31) - 1;
pub const MIN_MAX_FRAME_SIZE: u32 = DEFAULT_MAX_FRAME_SIZE;
pub const MAX_MAX_FRAME_SIZE: u32 = (1 << 24) - 1;

/// The six SETTINGS values a peer may advertise. Unknown identifiers on the
/// wire are ignored per spec, never surfaced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsConfig {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: Option<u32>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            header_table_size: DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
            enable_push: DEFAULT_ENABLE_PUSH,
            max_concurrent_streams: Some(DEFAULT_MAX_CONCURRENT_STREAMS),
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: Some(DEFAULT_MAX_HEADER_LIST_SIZE),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub ack: bool,
    pub config: SettingsConfig,
}

impl Settings {
    pub fn ack() -> Self {
        Self {
            ack: true,
            config: SettingsConfig::default(),
        }
    }

    /// Parses the `(id:16, value:32)` entry sequence of a non-ACK SETTINGS
    /// payload, starting from `current` (so unset identifiers keep their
    /// previous value rather than resetting to spec defaults).
    pub fn parse_payload(payload: &[u8], current: SettingsConfig) -> Result<Self, Error> {
        if payload.len() % 6 != 0 {
            return Err(Error::InvalidPayloadLength);
        }
        let mut config = current;
        for chunk in payload.chunks_exact(6) {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
            match id {
                id if id == SETTINGS_HEADER_TABLE_SIZE => config.header_table_size = value,
                id if id == SETTINGS_ENABLE_PUSH => {
                    config.enable_push = match value {
                        0 => false,
                        1 => true,
                        _ => return Err(Error::InvalidSettingValue),
                    }
                }
                id if id == SETTINGS_MAX_CONCURRENT_STREAMS => {
                    config.max_concurrent_streams = Some(value)
                }
                id if id == SETTINGS_INITIAL_WINDOW_SIZE => {
                    if value > MAX_INITIAL_WINDOW_SIZE {
                        return Err(Error::InvalidSettingValue);
                    }
                    config.initial_window_size = value;
                }
                id if id == SETTINGS_MAX_FRAME_SIZE => {
                    if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&value) {
                        return Err(Error::InvalidSettingValue);
                    }
                    config.max_frame_size = value;
                }
                id if id == SETTINGS_MAX_HEADER_LIST_SIZE => {
                    config.max_header_list_size = Some(value)
                }
                // Unknown identifiers MUST be ignored (RFC 7540 §6.5.2).
                _ => {}
            }
        }
        Ok(Settings {
            ack: false,
            config,
        })
    }

    pub fn encode_payload(config: &SettingsConfig) -> Vec<u8> {
        let mut out = Vec::with_capacity(36);
        let mut push = |id: u16, value: u32| {
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        };
        push(SETTINGS_HEADER_TABLE_SIZE, config.header_table_size);
        push(SETTINGS_ENABLE_PUSH, config.enable_push as u32);
        if let Some(v) = config.max_concurrent_streams {
            push(SETTINGS_MAX_CONCURRENT_STREAMS, v);
        }
        push(SETTINGS_INITIAL_WINDOW_SIZE, config.initial_window_size);
        push(SETTINGS_MAX_FRAME_SIZE, config.max_frame_size);
        if let Some(v) = config.max_header_list_size {
            push(SETTINGS_MAX_HEADER_LIST_SIZE, v);
        }
        out
    }
}
