use siltfs::{FileSystem, SimDisk};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_IMAGE: AtomicUsize = AtomicUsize::new(0);

/// A uniquely named backing image in the host temp directory, removed
/// again when the test finishes.
pub struct TempImage {
    pub path: PathBuf,
}

impl TempImage {
    pub fn new(tag: &str) -> Self {
        let serial = NEXT_IMAGE.fetch_add(1, Ordering::SeqCst);

        let mut path = std::env::temp_dir();
        path.push(format!(
            "siltfs-{}-{}-{}.img",
            tag,
            std::process::id(),
            serial
        ));
        let _ = std::fs::remove_file(&path);

        return Self { path };
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Boots a file system on a fresh image, formatting it in the process.
pub fn boot_fresh(tag: &str) -> (FileSystem<SimDisk>, TempImage) {
    let _ = env_logger::builder().is_test(true).try_init();

    let image = TempImage::new(tag);
    let fs = FileSystem::boot(&image.path).expect("boot should format a fresh image");

    return (fs, image);
}

/// Reads the raw bytes of a backing image.
pub fn read_image(image: &TempImage) -> Vec<u8> {
    return std::fs::read(&image.path).expect("backing image should be readable");
}
