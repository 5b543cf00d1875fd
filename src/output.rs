use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::field::Field3;




/**
 * Write a scalar field to a raw binary file: `nx * ny * nz` little-endian
 * f64 values in (i, j, k) index order, i fastest. Row pitch is stripped,
 * so the file length in entries is exactly the logical cell count.
 */
pub fn save_scalar_field<P: AsRef<Path>>(field: &Field3, path: P) -> io::Result<()> {
    let file = File::create(path)?;
    let mut buffer = BufWriter::new(file);

    for value in field.extract_k(0..field.nz()) {
        buffer.write_all(&value.to_le_bytes())?;
    }
    buffer.flush()
}


/**
 * Read a field back from the layout written by `save_scalar_field`.
 */
pub fn load_scalar_field<P: AsRef<Path>>(
    path: P,
    nx: usize,
    ny: usize,
    nz: usize,
) -> io::Result<Field3> {
    let file = File::open(path)?;
    let mut buffer = BufReader::new(file);
    let mut data = Vec::with_capacity(nx * ny * nz);

    for _ in 0..nx * ny * nz {
        let mut bytes = [0; 8];
        buffer.read_exact(&mut bytes)?;
        data.push(f64::from_le_bytes(bytes));
    }
    Ok(Field3::from_data(nx, ny, nz, data))
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{load_scalar_field, save_scalar_field};
    use crate::field::Field3;

    #[test]
    fn the_file_holds_exactly_one_entry_per_logical_cell() {
        let field = Field3::with_pitch(5, 4, 3, 8);
        let path = std::env::temp_dir().join("slabflow_entry_count.bin");

        save_scalar_field(&field, &path).unwrap();
        let bytes = std::fs::metadata(&path).unwrap().len();
        assert_eq!(bytes, (5 * 4 * 3 * 8) as u64);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn fields_round_trip_through_disk() {
        let field = Field3::from_function(4, 3, 5, |i, j, k| (i + 10 * j + 100 * k) as f64);
        let path = std::env::temp_dir().join("slabflow_round_trip.bin");

        save_scalar_field(&field, &path).unwrap();
        let loaded = load_scalar_field(&path, 4, 3, 5).unwrap();
        assert_eq!(loaded.data(), field.data());
        std::fs::remove_file(&path).unwrap();
    }
}
