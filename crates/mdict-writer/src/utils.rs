use mdict_common::{MdictError, MdictResult};

fn too_short(what: &str) -> MdictError {
    MdictError::DecodeError(format!("Unexpected end of data while reading {}", what).into())
}

pub(crate) fn get_bytes<'a>(
    bytes: &'a [u8],
    n: usize,
    what: &str,
) -> MdictResult<(&'a [u8], &'a [u8])> {
    if bytes.len() < n {
        return Err(too_short(what));
    }
    Ok(bytes.split_at(n))
}

pub(crate) fn get_u16_be<'a>(bytes: &'a [u8], what: &str) -> MdictResult<(u16, &'a [u8])> {
    let (head, rest) = get_bytes(bytes, 2, what)?;
    Ok((u16::from_be_bytes(head.try_into().unwrap()), rest))
}

pub(crate) fn get_u32_be<'a>(bytes: &'a [u8], what: &str) -> MdictResult<(u32, &'a [u8])> {
    let (head, rest) = get_bytes(bytes, 4, what)?;
    Ok((u32::from_be_bytes(head.try_into().unwrap()), rest))
}

pub(crate) fn get_u32_le<'a>(bytes: &'a [u8], what: &str) -> MdictResult<(u32, &'a [u8])> {
    let (head, rest) = get_bytes(bytes, 4, what)?;
    Ok((u32::from_le_bytes(head.try_into().unwrap()), rest))
}

pub(crate) fn get_u64_be<'a>(bytes: &'a [u8], what: &str) -> MdictResult<(u64, &'a [u8])> {
    let (head, rest) = get_bytes(bytes, 8, what)?;
    Ok((u64::from_be_bytes(head.try_into().unwrap()), rest))
}

/// Converts a length read from the file, refusing values larger than the
/// data that is left.
pub(crate) fn checked_len(len: u64, available: usize, what: &str) -> MdictResult<usize> {
    usize::try_from(len)
        .ok()
        .filter(|&len| len <= available)
        .ok_or_else(|| MdictError::DecodeError(format!("Invalid {} length {}", what, len).into()))
}
