extern crate siltfs;

use siltfs::layout::{DIRENTS_PER_SECTOR, DIRENT_BYTES};
use siltfs::{DirEntry, FsError};

mod common;
use common::*;

#[test]
fn test_create_and_list() {
    let (mut fs, _image) = boot_fresh("list");

    fs.create_dir("/a").unwrap();
    fs.create_file("/a/one").unwrap();
    fs.create_file("/a/two").unwrap();

    assert_eq!(fs.dir_size("/a").unwrap(), 2 * DIRENT_BYTES);

    let mut entries = vec![DirEntry::EMPTY; 2];
    assert_eq!(fs.read_dir("/a", &mut entries).unwrap(), 2);
    assert_eq!(entries[0].name(), "one");
    assert_eq!(entries[1].name(), "two");
}

#[test]
fn test_create_unlink_restores_the_image() {
    let (mut fs, image) = boot_fresh("roundtrip");
    let before = read_image(&image);

    fs.create_file("/transient").unwrap();
    fs.remove_file("/transient").unwrap();
    fs.sync().unwrap();

    assert_eq!(read_image(&image), before);
}

#[test]
fn test_create_existing_entry_fails() {
    let (mut fs, _image) = boot_fresh("exists");

    fs.create_file("/f").unwrap();
    assert_eq!(fs.create_file("/f").unwrap_err(), FsError::Create);

    // Files and directories share the dirent namespace.
    assert_eq!(fs.create_dir("/f").unwrap_err(), FsError::Create);

    fs.create_dir("/d").unwrap();
    assert_eq!(fs.create_file("/d").unwrap_err(), FsError::Create);
    assert_eq!(fs.create_dir("/").unwrap_err(), FsError::Create);
}

#[test]
fn test_create_under_a_broken_parent_fails() {
    let (mut fs, _image) = boot_fresh("noparent");

    assert_eq!(fs.create_file("/no/file").unwrap_err(), FsError::Create);
    assert_eq!(fs.create_dir("/no/dir").unwrap_err(), FsError::Create);

    // A file cannot serve as an intermediate component.
    fs.create_file("/plain").unwrap();
    assert_eq!(
        fs.create_file("/plain/child").unwrap_err(),
        FsError::Create
    );
}

#[test]
fn test_illegal_names_are_rejected_everywhere() {
    let (mut fs, _image) = boot_fresh("names");

    assert_eq!(fs.create_file("/bad name").unwrap_err(), FsError::Create);
    assert_eq!(fs.create_file("/semi;colon").unwrap_err(), FsError::Create);
    assert_eq!(fs.create_dir("/st*ar").unwrap_err(), FsError::Create);

    // MAX_NAME characters (one too many once the terminator is counted).
    assert_eq!(
        fs.create_file("/abcdefghijklmnop").unwrap_err(),
        FsError::Create
    );
    // MAX_NAME - 1 characters is the longest legal name.
    fs.create_file("/abcdefghijklmno").unwrap();

    assert_eq!(fs.open("/bad name").unwrap_err(), FsError::NoSuchFile);
    assert_eq!(fs.remove_file("/bad name").unwrap_err(), FsError::NoSuchFile);
    assert_eq!(fs.dir_size("/bad name").unwrap_err(), FsError::NoSuchDir);

    // An illegal intermediate component breaks the whole resolution.
    assert_eq!(fs.create_file("/bad name/x").unwrap_err(), FsError::Create);

    // Relative and oversized paths are malformed.
    assert_eq!(fs.create_file("relative").unwrap_err(), FsError::Create);
    let long_path = format!("/{}", "a/".repeat(200));
    assert_eq!(fs.create_file(&long_path).unwrap_err(), FsError::Create);
}

#[test]
fn test_consecutive_separators_are_ignored() {
    let (mut fs, _image) = boot_fresh("slashes");

    fs.create_dir("/a").unwrap();
    fs.create_file("//a///f").unwrap();

    let fd = fs.open("/a/f").unwrap();
    fs.close(fd).unwrap();
}

#[test]
fn test_remove_dir_errors() {
    let (mut fs, _image) = boot_fresh("rmdir");

    assert_eq!(fs.remove_dir("/").unwrap_err(), FsError::RootDir);
    assert_eq!(fs.remove_dir("//").unwrap_err(), FsError::RootDir);
    assert_eq!(fs.remove_dir("/nope").unwrap_err(), FsError::NoSuchDir);

    fs.create_dir("/a").unwrap();
    fs.create_dir("/a/b").unwrap();
    assert_eq!(fs.remove_dir("/a").unwrap_err(), FsError::DirNotEmpty);

    fs.remove_dir("/a/b").unwrap();
    fs.remove_dir("/a").unwrap();
    assert_eq!(fs.dir_size("/").unwrap(), 0);
}

#[test]
fn test_remove_with_the_wrong_type_fails() {
    let (mut fs, _image) = boot_fresh("wrongtype");

    fs.create_file("/f").unwrap();
    fs.create_dir("/d").unwrap();

    assert_eq!(fs.remove_dir("/f").unwrap_err(), FsError::General);
    assert_eq!(fs.remove_file("/d").unwrap_err(), FsError::General);

    // Both survive the failed attempts.
    fs.remove_file("/f").unwrap();
    fs.remove_dir("/d").unwrap();
}

#[test]
fn test_removal_compacts_with_the_last_entry() {
    let (mut fs, _image) = boot_fresh("swap");

    for i in 0..6 {
        fs.create_file(&format!("/f{}", i)).unwrap();
    }

    fs.remove_file("/f2").unwrap();

    // The last entry (f5) is swapped into the vacated slot.
    let mut entries = vec![DirEntry::EMPTY; 5];
    assert_eq!(fs.read_dir("/", &mut entries).unwrap(), 5);
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["f0", "f1", "f5", "f3", "f4"]);

    fs.remove_file("/f0").unwrap();
    let mut entries = vec![DirEntry::EMPTY; 4];
    assert_eq!(fs.read_dir("/", &mut entries).unwrap(), 4);
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["f4", "f1", "f5", "f3"]);
}

#[test]
fn test_directory_grows_beyond_one_sector() {
    let (mut fs, _image) = boot_fresh("bigdir");
    let count = DIRENTS_PER_SECTOR + 5;

    fs.create_dir("/d").unwrap();
    for i in 0..count {
        fs.create_file(&format!("/d/f{}", i)).unwrap();
    }

    assert_eq!(fs.dir_size("/d").unwrap(), count * DIRENT_BYTES);

    let mut entries = vec![DirEntry::EMPTY; count];
    assert_eq!(fs.read_dir("/d", &mut entries).unwrap(), count);
    for i in 0..count {
        assert_eq!(entries[i].name(), format!("f{}", i));
    }

    // Every name still resolves once the dirents span two sectors.
    let fd = fs.open(&format!("/d/f{}", count - 1)).unwrap();
    fs.close(fd).unwrap();
}

#[test]
fn test_shrinking_a_directory_releases_its_trailing_sector() {
    let (mut fs, image) = boot_fresh("shrink");

    fs.create_dir("/d").unwrap();
    for i in 0..DIRENTS_PER_SECTOR {
        fs.create_file(&format!("/d/f{}", i)).unwrap();
    }
    fs.sync().unwrap();
    let before = read_image(&image);

    // The entry that opens a second dirent sector, created and removed,
    // leaves no trace: the sector goes back to the bitmap.
    fs.create_file("/d/overflow").unwrap();
    fs.remove_file("/d/overflow").unwrap();
    fs.sync().unwrap();

    assert_eq!(read_image(&image), before);
}

#[test]
fn test_read_dir_demands_a_full_buffer() {
    let (mut fs, _image) = boot_fresh("dirbuf");

    for i in 0..4 {
        fs.create_file(&format!("/f{}", i)).unwrap();
    }

    let mut small = vec![DirEntry::EMPTY; 3];
    assert_eq!(
        fs.read_dir("/", &mut small).unwrap_err(),
        FsError::BufferTooSmall
    );

    let mut exact = vec![DirEntry::EMPTY; 4];
    assert_eq!(fs.read_dir("/", &mut exact).unwrap(), 4);

    assert_eq!(fs.read_dir("/nope", &mut exact).unwrap_err(), FsError::NoSuchDir);
}

#[test]
fn test_last_error_is_recorded() {
    let (mut fs, _image) = boot_fresh("lasterr");

    assert_eq!(fs.last_error(), None);

    let _ = fs.remove_dir("/");
    assert_eq!(fs.last_error(), Some(FsError::RootDir));

    let _ = fs.open("/nope");
    assert_eq!(fs.last_error(), Some(FsError::NoSuchFile));

    // Success does not clear the slot; it holds the most recent failure.
    fs.create_file("/f").unwrap();
    assert_eq!(fs.last_error(), Some(FsError::NoSuchFile));
}
