//! Frame encoding and decoding
//!
//! Wire format (every byte 7-bit clean except the status and terminator):
//! ```text
//! ┌──────┬──────┬────────┬──────┬──────┬──────────┬──────────────────┬───────────────┬──────┐
//! │ F0   │ 43   │ sub|dev│ 3E   │ 12   │ category │ elem/index/chan  │ value (5B)    │ F7   │
//! │      │Yamaha│ nibbles│group │model │          │ hi,lo ×3 (6B)    │ change only   │      │
//! └──────┴──────┴────────┴──────┴──────┴──────────┴──────────────────┴───────────────┴──────┘
//! ```

use super::error::DecodeError;
use super::{Parameter, Value, VALUE_BITS};

pub const STATUS_SYSEX: u8 = 0xF0;
pub const MANUFACTURER_YAMAHA: u8 = 0x43;
pub const GROUP_DIGITAL_MIXER: u8 = 0x3E;
pub const MODEL_LS9: u8 = 0x12;
pub const TERMINATOR: u8 = 0xF7;

/// Sub-status values (high nibble of byte 2)
pub const SUB_BULK_DUMP: u8 = 0x0;
pub const SUB_PARAM_CHANGE: u8 = 0x1;
pub const SUB_BULK_REQUEST: u8 = 0x2;
pub const SUB_PARAM_REQUEST: u8 = 0x3;

/// Data categories (byte 5)
pub const CATEGORY_FUNCTION_CALL: u8 = 0x00;
pub const CATEGORY_SCENE_SETUP_DATA: u8 = 0x01;
pub const CATEGORY_LEVEL_METER: u8 = 0x21;

const OFFSET_STATUS: usize = 0;
const OFFSET_MANUFACTURER: usize = 1;
const OFFSET_SUB_STATUS: usize = 2;
const OFFSET_GROUP: usize = 3;
const OFFSET_MODEL: usize = 4;
const OFFSET_CATEGORY: usize = 5;
const OFFSET_ADDRESS: usize = 6;
const OFFSET_VALUE: usize = 12;

pub const HEADER_LEN: usize = 6;
const ADDRESS_LEN: usize = 6;
const VALUE_LEN: usize = 5;

/// Length of a parameter change frame
pub const PARAM_CHANGE_LEN: usize = HEADER_LEN + ADDRESS_LEN + VALUE_LEN + 1;

/// Length of a parameter request frame
pub const PARAM_REQUEST_LEN: usize = HEADER_LEN + ADDRESS_LEN + 1;

/// Encode a "parameter change" frame (write a value)
pub fn encode_param_change(param: Parameter, value: Value) -> [u8; PARAM_CHANGE_LEN] {
    let mut frame = [0u8; PARAM_CHANGE_LEN];
    write_header(&mut frame, SUB_PARAM_CHANGE);
    write_address(&mut frame, param);
    for (group, byte) in frame[OFFSET_VALUE..OFFSET_VALUE + VALUE_LEN]
        .iter_mut()
        .enumerate()
    {
        let shift = 7 * (VALUE_LEN - 1 - group);
        *byte = ((value >> shift) & 0x7F) as u8;
    }
    frame[PARAM_CHANGE_LEN - 1] = TERMINATOR;
    frame
}

/// Encode a "parameter request" frame (ask the mixer to report a value)
pub fn encode_param_request(param: Parameter) -> [u8; PARAM_REQUEST_LEN] {
    let mut frame = [0u8; PARAM_REQUEST_LEN];
    write_header(&mut frame, SUB_PARAM_REQUEST);
    write_address(&mut frame, param);
    frame[PARAM_REQUEST_LEN - 1] = TERMINATOR;
    frame
}

/// Decode a parameter change notification
///
/// Only "parameter change" frames in the scene/setup/user-data category are
/// accepted. Fields are checked in wire order so the reported error names the
/// first offending field.
pub fn decode(data: &[u8]) -> Result<(Parameter, Value), DecodeError> {
    check_header(data, SUB_PARAM_CHANGE)?;
    check_terminator(data, PARAM_CHANGE_LEN)?;

    let param = read_address(data);
    let raw = data[OFFSET_VALUE..OFFSET_VALUE + VALUE_LEN]
        .iter()
        .fold(0i64, |acc, &group| (acc << 7) | i64::from(group & 0x7F));

    // Sign-extend from bit 34
    let unused = 64 - VALUE_BITS;
    let value = (raw << unused) >> unused;

    Ok((param, value))
}

/// Decode a parameter request frame
///
/// The mixer never sends these; this is the device side of the exchange and
/// is used by the simulated device.
pub fn decode_request(data: &[u8]) -> Result<Parameter, DecodeError> {
    check_header(data, SUB_PARAM_REQUEST)?;
    check_terminator(data, PARAM_REQUEST_LEN)?;
    Ok(read_address(data))
}

fn write_header(frame: &mut [u8], sub_status: u8) {
    frame[OFFSET_STATUS] = STATUS_SYSEX;
    frame[OFFSET_MANUFACTURER] = MANUFACTURER_YAMAHA;
    // Device number (low nibble) is always 0
    frame[OFFSET_SUB_STATUS] = sub_status << 4;
    frame[OFFSET_GROUP] = GROUP_DIGITAL_MIXER;
    frame[OFFSET_MODEL] = MODEL_LS9;
    frame[OFFSET_CATEGORY] = CATEGORY_SCENE_SETUP_DATA;
}

fn write_address(frame: &mut [u8], param: Parameter) {
    let fields = [param.element, param.index, param.channel];
    for (i, field) in fields.into_iter().enumerate() {
        frame[OFFSET_ADDRESS + 2 * i] = ((field >> 7) & 0x7F) as u8;
        frame[OFFSET_ADDRESS + 2 * i + 1] = (field & 0x7F) as u8;
    }
}

fn read_address(data: &[u8]) -> Parameter {
    let field = |i: usize| {
        let high = u16::from(data[OFFSET_ADDRESS + 2 * i] & 0x7F);
        let low = u16::from(data[OFFSET_ADDRESS + 2 * i + 1] & 0x7F);
        high << 7 | low
    };
    Parameter::new(field(0), field(1), field(2))
}

fn check_header(data: &[u8], expected_sub_status: u8) -> Result<(), DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            len: data.len(),
            expected: HEADER_LEN,
        });
    }

    if data[OFFSET_STATUS] != STATUS_SYSEX {
        return Err(DecodeError::UnsupportedStatus(data[OFFSET_STATUS]));
    }
    if data[OFFSET_MANUFACTURER] != MANUFACTURER_YAMAHA {
        return Err(DecodeError::UnsupportedManufacturer(data[OFFSET_MANUFACTURER]));
    }
    if data[OFFSET_GROUP] != GROUP_DIGITAL_MIXER {
        return Err(DecodeError::UnsupportedGroup(data[OFFSET_GROUP]));
    }
    if data[OFFSET_MODEL] != MODEL_LS9 {
        return Err(DecodeError::UnsupportedModel(data[OFFSET_MODEL]));
    }

    let sub_status = data[OFFSET_SUB_STATUS] >> 4;
    if sub_status != expected_sub_status {
        return Err(DecodeError::UnsupportedSubStatus(sub_status));
    }

    match data[OFFSET_CATEGORY] {
        CATEGORY_SCENE_SETUP_DATA => Ok(()),
        CATEGORY_FUNCTION_CALL => Err(DecodeError::FunctionCallUnsupported),
        CATEGORY_LEVEL_METER => Err(DecodeError::LevelMeterUnsupported),
        other => Err(DecodeError::UnsupportedDataCategory(other)),
    }
}

fn check_terminator(data: &[u8], frame_len: usize) -> Result<(), DecodeError> {
    if data.len() < frame_len {
        return Err(DecodeError::Truncated {
            len: data.len(),
            expected: frame_len,
        });
    }
    match data[frame_len - 1] {
        TERMINATOR => Ok(()),
        other => Err(DecodeError::MissingTerminator(other)),
    }
}
