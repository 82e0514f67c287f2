// SPIR-V loading
//
// The loader is the only file I/O in the backend; pipeline construction
// consumes its output once it exists.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::error::{BackendError, Result};

/// Read a compiled SPIR-V binary from disk.
pub fn read_spirv(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(BackendError::ShaderNotFound(path.to_path_buf()))
        }
        Err(err) => Err(BackendError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shader_maps_to_dedicated_error() {
        let err = read_spirv("definitely/not/here.spv").unwrap_err();
        assert!(matches!(err, BackendError::ShaderNotFound(_)));
    }

    #[test]
    fn reads_binary_payload_verbatim() {
        let path = std::env::temp_dir().join("vk_raytracer_read_spirv_test.spv");
        let payload = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x00, 0x00];
        fs::write(&path, payload).unwrap();
        assert_eq!(read_spirv(&path).unwrap(), payload.to_vec());
        let _ = fs::remove_file(&path);
    }
}
