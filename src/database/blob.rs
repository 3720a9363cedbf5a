//! Byte encoding of opacity vectors stored in the database.
//!
//! Vectors are stored as complete `.npy` files, so a reader with numpy can `np.load` a blob
//! straight out of a row.

use npyz::WriterBuilder;

use crate::errors::OpacityErr;

/// Encode a vector of `f64` as `.npy` bytes.
pub fn encode_array(values: &[f64]) -> Result<Vec<u8>, OpacityErr> {
    let mut buf = vec![];

    let mut writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(&[values.len() as u64])
        .writer(&mut buf)
        .begin_nd()?;
    writer.extend(values.iter().copied())?;
    writer.finish()?;

    Ok(buf)
}

/// Decode `.npy` bytes written by [`encode_array`].
pub fn decode_array(bytes: &[u8]) -> Result<Vec<f64>, OpacityErr> {
    let npy = npyz::NpyFile::new(bytes)?;

    if npy.shape().len() != 1 {
        return Err(OpacityErr::GeneralError(format!(
            "expected a 1-D array, found shape {:?}",
            npy.shape()
        )));
    }

    Ok(npy.into_vec::<f64>()?)
}
