// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Numeric decoder
//!
//! Interprets a raw little-endian byte buffer of a tagged element type as
//! double-precision scalars. All functions are pure and operate on slices
//! with explicit bounds checks, so they can run inside the real-time tick.
//!
//! ```
//! use rust_rtscope::acquisition::DataType;
//! use rust_rtscope::acquisition::decoder::decode_element;
//!
//! let bytes = (-1234i16).to_le_bytes();
//! assert_eq!(decode_element(DataType::S16, &bytes).unwrap(), -1234.0);
//! ```

use std::fmt::Write;

use thiserror::Error;

use super::DataType;

/// Errors produced while decoding a tagged byte buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Data type {0} cannot be decoded as a scalar")]
    UnsupportedType(DataType),

    #[error("Buffer too short: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Buffer of {len} bytes is not a whole number of {element_size}-byte elements")]
    Misaligned { len: usize, element_size: usize },
}

fn check_numeric(data_type: DataType) -> Result<usize, DecodeError> {
    if !data_type.is_numeric() {
        return Err(DecodeError::UnsupportedType(data_type));
    }
    Ok(data_type.byte_size())
}

fn check_len(needed: usize, available: usize) -> Result<(), DecodeError> {
    if available < needed {
        return Err(DecodeError::Truncated { needed, available });
    }
    Ok(())
}

fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&chunk[..N]);
    array
}

/// Decode one element whose length has already been validated.
fn decode_unchecked(data_type: DataType, chunk: &[u8]) -> f64 {
    match data_type {
        DataType::U8 => chunk[0] as f64,
        DataType::S8 => chunk[0] as i8 as f64,
        DataType::U16 => u16::from_le_bytes(le_array(chunk)) as f64,
        DataType::S16 => i16::from_le_bytes(le_array(chunk)) as f64,
        DataType::U32 => u32::from_le_bytes(le_array(chunk)) as f64,
        DataType::S32 => i32::from_le_bytes(le_array(chunk)) as f64,
        DataType::U64 => u64::from_le_bytes(le_array(chunk)) as f64,
        DataType::S64 => i64::from_le_bytes(le_array(chunk)) as f64,
        DataType::F32 => f32::from_le_bytes(le_array(chunk)) as f64,
        DataType::F64 => f64::from_le_bytes(le_array(chunk)),
        DataType::B1 | DataType::B2 | DataType::B3 | DataType::B4 => {
            (chunk[0] & bit_mask(data_type) as u8) as f64
        }
    }
}

fn bit_mask(data_type: DataType) -> u64 {
    match data_type.bit_width() {
        64 => u64::MAX,
        bits => (1u64 << bits) - 1,
    }
}

/// Decode the first element of `bytes` as `data_type`.
pub fn decode_element(data_type: DataType, bytes: &[u8]) -> Result<f64, DecodeError> {
    let size = check_numeric(data_type)?;
    check_len(size, bytes.len())?;
    Ok(decode_unchecked(data_type, bytes))
}

/// Iterate over every element of `bytes`.
///
/// The whole buffer is validated up front, so the iterator itself cannot fail.
pub fn decode_iter(
    data_type: DataType,
    bytes: &[u8],
) -> Result<impl Iterator<Item = f64> + '_, DecodeError> {
    let size = check_numeric(data_type)?;
    if bytes.len() % size != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            element_size: size,
        });
    }
    Ok(bytes
        .chunks_exact(size)
        .map(move |chunk| decode_unchecked(data_type, chunk)))
}

/// Decode every element of `bytes` into `out`, returning the number written.
///
/// Fails when `out` cannot hold all the elements.
pub fn decode_into(
    data_type: DataType,
    bytes: &[u8],
    out: &mut [f64],
) -> Result<usize, DecodeError> {
    let size = check_numeric(data_type)?;
    let count = bytes.len() / size;
    check_len(count, out.len())?;
    for (slot, value) in out.iter_mut().zip(decode_iter(data_type, bytes)?) {
        *slot = value;
    }
    Ok(count)
}

/// Read a raw unsigned counter (timestamps, latches) from the first element.
///
/// Integer types are zero-extended from their own width, so a 32-bit
/// counter stays in `0..=u32::MAX`. Bit types are masked to their width.
pub fn decode_counter(data_type: DataType, bytes: &[u8]) -> Result<u64, DecodeError> {
    if data_type.is_float() {
        return Err(DecodeError::UnsupportedType(data_type));
    }
    let size = data_type.byte_size();
    check_len(size, bytes.len())?;
    let raw = match size {
        1 => bytes[0] as u64,
        2 => u16::from_le_bytes(le_array(bytes)) as u64,
        4 => u32::from_le_bytes(le_array(bytes)) as u64,
        _ => u64::from_le_bytes(le_array(bytes)),
    };
    Ok(raw & bit_mask(data_type))
}

/// Encode `value` as one element of `data_type` at the start of `out`.
///
/// Integer conversions saturate at the type bounds.
pub fn encode_element(data_type: DataType, value: f64, out: &mut [u8]) -> Result<(), DecodeError> {
    let size = check_numeric(data_type)?;
    check_len(size, out.len())?;
    let out = &mut out[..size];
    match data_type {
        DataType::U8 => out[0] = value as u8,
        DataType::S8 => out[0] = (value as i8) as u8,
        DataType::U16 => out.copy_from_slice(&(value as u16).to_le_bytes()),
        DataType::S16 => out.copy_from_slice(&(value as i16).to_le_bytes()),
        DataType::U32 => out.copy_from_slice(&(value as u32).to_le_bytes()),
        DataType::S32 => out.copy_from_slice(&(value as i32).to_le_bytes()),
        DataType::U64 => out.copy_from_slice(&(value as u64).to_le_bytes()),
        DataType::S64 => out.copy_from_slice(&(value as i64).to_le_bytes()),
        DataType::F32 => out.copy_from_slice(&(value as f32).to_le_bytes()),
        DataType::F64 => out.copy_from_slice(&value.to_le_bytes()),
        DataType::B1 | DataType::B2 | DataType::B3 | DataType::B4 => {
            return Err(DecodeError::UnsupportedType(data_type))
        }
    }
    Ok(())
}

/// Encode a raw counter value, truncated to the width of `data_type`.
pub fn encode_counter(data_type: DataType, value: u64, out: &mut [u8]) -> Result<(), DecodeError> {
    if data_type.is_float() {
        return Err(DecodeError::UnsupportedType(data_type));
    }
    let size = data_type.byte_size();
    check_len(size, out.len())?;
    let masked = value & bit_mask(data_type);
    out[..size].copy_from_slice(&masked.to_le_bytes()[..size]);
    Ok(())
}

/// Render every element of `bytes` for debug output, e.g. `[1, 2, 3]`.
pub fn format_elements(data_type: DataType, bytes: &[u8]) -> Result<String, DecodeError> {
    let mut text = String::with_capacity(bytes.len() * 4 + 2);
    text.push('[');
    for (index, value) in decode_iter(data_type, bytes)?.enumerate() {
        if index > 0 {
            text.push_str(", ");
        }
        let _ = write!(text, "{}", value);
    }
    text.push(']');
    Ok(text)
}
