//! End-to-end scenarios over a real `tempfile`-backed package, covering the
//! concrete walkthroughs and testable invariants this container is expected
//! to uphold.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};

use packfs::header::TypeSize;
use packfs::writer::{PackOptions, PackWriter};
use packfs::{tid, PackageReader};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn pack_with(typesize: TypeSize) -> (PackWriter, File) {
    init_tracing();
    let file = tempfile::tempfile().unwrap();
    let writer = PackWriter::new(PackOptions { typesize, ..Default::default() });
    (writer, file)
}

#[test]
fn s1_info_round_trip() {
    let (w, mut f) = pack_with(TypeSize { tid_width: 2, tagsize_width: 2, tssize_width: 2 });
    w.begin::<_, File>(&mut f, None).unwrap();

    let mut info = w.ftt().set_info();
    info.put(tid::LABEL, &packfs::TagRaw::from_str_val("empty-package"));
    info.put(tid::LINK, &packfs::TagRaw::from_str_val("host/project"));
    info.put(tid::AUTHOR, &packfs::TagRaw::from_str_val("alice"));
    w.ftt().set_tagset(".", info);

    w.sync::<_, File>(&mut f, None).unwrap();

    f.seek(SeekFrom::Start(0)).unwrap();
    let reader = PackageReader::open_ftt(f).unwrap();
    let info = reader.ftt().info().unwrap();
    assert_eq!(info.get(tid::LABEL).unwrap().as_str(), Some("empty-package"));
    assert_eq!(info.get(tid::LINK).unwrap().as_str(), Some("host/project"));
    assert_eq!(info.get(tid::AUTHOR).unwrap().as_str(), Some("alice"));
}

#[test]
fn s2_pack_alias_and_delete() {
    let (w, mut f) = pack_with(TypeSize::COMMON);
    w.begin::<_, File>(&mut f, None).unwrap();

    w.pack_data(&mut f, "bounty".as_bytes(), "bounty.jpg").unwrap();
    w.pack_data(&mut f, "claustral".as_bytes(), "img1/claustral.jpg").unwrap();
    w.pack_data(&mut f, "qarataslar".as_bytes(), "img1/qarataslar.jpg").unwrap();
    w.put_alias("img1/claustral.jpg", "basaltbay.jpg").unwrap();
    w.pack_data(&mut f, "The quick brown fox jumps over the lazy dog".as_bytes(), "sample.txt").unwrap();
    w.put_alias("img1/claustral.jpg", "jasper.jpg").unwrap();
    w.del_alias("basaltbay.jpg").unwrap();

    w.sync::<_, File>(&mut f, None).unwrap();

    f.seek(SeekFrom::Start(0)).unwrap();
    let reader = PackageReader::open_ftt(f).unwrap();
    assert!(reader.stat("jasper.jpg").is_ok());
    assert!(reader.stat("basaltbay.jpg").is_err());
    assert_eq!(reader.read_file("jasper.jpg").unwrap(), reader.read_file("img1/claustral.jpg").unwrap());
    assert_eq!(reader.ftt().len(), 5);
}

#[test]
fn s3_append_continuity() {
    let (w1, mut f) = pack_with(TypeSize::COMMON);
    w1.begin::<_, File>(&mut f, None).unwrap();
    w1.pack_data(&mut f, "a".as_bytes(), "a.txt").unwrap();
    w1.pack_data(&mut f, "b".as_bytes(), "b.txt").unwrap();
    w1.pack_data(&mut f, "c".as_bytes(), "c.txt").unwrap();
    w1.sync::<_, File>(&mut f, None).unwrap();

    let a_before = w1.ftt().tagset("a.txt").unwrap().pos().unwrap();
    let b_before = w1.ftt().tagset("b.txt").unwrap().pos().unwrap();
    let c_before = w1.ftt().tagset("c.txt").unwrap().pos().unwrap();

    let w2 = PackWriter::new(PackOptions { typesize: TypeSize::COMMON, ..Default::default() });
    w2.append::<_, File>(&mut f, None).unwrap();
    w2.pack_data(&mut f, "d".as_bytes(), "d.txt").unwrap();
    w2.pack_data(&mut f, "e".as_bytes(), "e.txt").unwrap();
    w2.sync::<_, File>(&mut f, None).unwrap();

    assert_eq!(w2.ftt().len(), 5);
    assert_eq!(w2.ftt().tagset("a.txt").unwrap().pos().unwrap(), a_before);
    assert_eq!(w2.ftt().tagset("b.txt").unwrap().pos().unwrap(), b_before);
    assert_eq!(w2.ftt().tagset("c.txt").unwrap().pos().unwrap(), c_before);

    let d_offset = w2.ftt().tagset("d.txt").unwrap().offset().unwrap();
    let e_offset = w2.ftt().tagset("e.txt").unwrap().offset().unwrap();
    assert!(d_offset > c_before.0 + c_before.1);
    assert!(e_offset > d_offset);
}

#[test]
fn s4_split_build() {
    init_tracing();
    let w = PackWriter::new(PackOptions { typesize: TypeSize::COMMON, ..Default::default() });
    let mut wpt = tempfile::tempfile().unwrap();
    let mut wpf = tempfile::tempfile().unwrap();

    w.begin(&mut wpt, Some(&mut wpf)).unwrap();
    w.pack_data(&mut wpf, "payload bytes".as_bytes(), "a.bin").unwrap();
    w.sync(&mut wpt, Some(&mut wpf)).unwrap();

    let wpf_len = wpf.metadata().unwrap().len();

    wpt.seek(SeekFrom::Start(0)).unwrap();
    let header = packfs::Header::read_from(&mut wpt).unwrap();
    assert!(header.is_ready().is_ok());
    assert!(header.is_splitted());
    assert_eq!(header.data_offset, 0);
    assert_eq!(header.data_size, wpf_len - packfs::header::HEADER_SIZE as u64);

    wpf.seek(SeekFrom::Start(0)).unwrap();
    let data_header = packfs::Header::read_from(&mut wpf).unwrap();
    assert!(data_header.is_ready().is_ok());

    wpt.seek(SeekFrom::Start(0)).unwrap();
    let reader = PackageReader::open_ftt(wpt).unwrap();
    assert_eq!(reader.ftt().tagset("a.bin").unwrap().size(), Some("payload bytes".len() as u64));
}

#[test]
fn s5_directory_synthesis() {
    let (w, mut f) = pack_with(TypeSize::COMMON);
    w.begin::<_, File>(&mut f, None).unwrap();
    w.pack_data(&mut f, "a".as_bytes(), "a.txt").unwrap();
    w.pack_data(&mut f, "b".as_bytes(), "dir/b.txt").unwrap();
    w.pack_data(&mut f, "c".as_bytes(), "dir/sub/c.txt").unwrap();
    w.sync::<_, File>(&mut f, None).unwrap();

    f.seek(SeekFrom::Start(0)).unwrap();
    let reader = PackageReader::open_ftt(f).unwrap();

    let root: std::collections::HashSet<_> = reader.read_dir(".", -1).unwrap().into_iter().map(|e| (e.name(), e.is_dir())).collect();
    assert!(root.contains(&("a.txt".to_owned(), false)));
    assert!(root.contains(&("dir".to_owned(), true)));
    assert_eq!(root.len(), 2);

    let dir: std::collections::HashSet<_> = reader.read_dir("dir", -1).unwrap().into_iter().map(|e| (e.name(), e.is_dir())).collect();
    assert!(dir.contains(&("b.txt".to_owned(), false)));
    assert!(dir.contains(&("sub".to_owned(), true)));
    assert_eq!(dir.len(), 2);

    let sub = reader.read_dir("dir/sub", -1).unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].name(), "c.txt");
}

#[test]
fn s6_union_precedence() {
    init_tracing();
    let w1 = PackWriter::new(PackOptions { typesize: TypeSize::COMMON, ..Default::default() });
    let mut buf1 = Cursor::new(Vec::new());
    w1.begin::<_, Cursor<Vec<u8>>>(&mut buf1, None).unwrap();
    w1.pack_data(&mut buf1, "A".as_bytes(), "k").unwrap();
    w1.sync::<_, Cursor<Vec<u8>>>(&mut buf1, None).unwrap();

    let w2 = PackWriter::new(PackOptions { typesize: TypeSize::COMMON, ..Default::default() });
    let mut buf2 = Cursor::new(Vec::new());
    w2.begin::<_, Cursor<Vec<u8>>>(&mut buf2, None).unwrap();
    w2.pack_data(&mut buf2, "B".as_bytes(), "k").unwrap();
    w2.pack_data(&mut buf2, "M".as_bytes(), "m").unwrap();
    w2.sync::<_, Cursor<Vec<u8>>>(&mut buf2, None).unwrap();

    let p1 = PackageReader::open_ftt(buf1).unwrap();
    let p2 = PackageReader::open_ftt(buf2).unwrap();
    let union = packfs::Union::new(vec![p1, p2]);

    assert_eq!(union.read_file("k").unwrap(), b"A");
    assert_eq!(union.read_file("m").unwrap(), b"M");

    let names: std::collections::HashSet<_> = union.read_dir(".", -1).unwrap().into_iter().map(|e| e.name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains("k"));
    assert!(names.contains("m"));
}

#[test]
fn boundary_opening_prebuild_signature_is_sign_pre() {
    let mut f = tempfile::tempfile().unwrap();
    let w = PackWriter::new(PackOptions::default());
    w.begin::<_, File>(&mut f, None).unwrap();
    // Never synced: header stays Prebuild.

    f.seek(SeekFrom::Start(0)).unwrap();
    let mut header_bytes = vec![0u8; packfs::header::HEADER_SIZE];
    f.read_exact(&mut header_bytes).unwrap();
    let mut f2 = Cursor::new(header_bytes);
    f2.seek(SeekFrom::Start(0)).unwrap();
    let header = packfs::Header::read_from(&mut f2).unwrap();
    let err = header.is_ready().unwrap_err();
    assert!(matches!(err, packfs::Error::SignPre));
}

#[test]
fn boundary_typesize_tagsize_wider_than_tssize_is_configuration_error() {
    let typesize = TypeSize { tid_width: 2, tagsize_width: 4, tssize_width: 2 };
    let err = typesize.checkup().unwrap_err();
    assert!(matches!(err, packfs::Error::TagsizeWiderThanTssize { .. }));
}

#[test]
fn invariant_round_trip_preserves_observable_state() {
    let (w, mut f) = pack_with(TypeSize::COMMON);
    w.begin::<_, File>(&mut f, None).unwrap();
    w.pack_data(&mut f, "one".as_bytes(), "a.txt").unwrap();
    w.pack_data(&mut f, "two".as_bytes(), "dir/b.txt").unwrap();
    w.sync::<_, File>(&mut f, None).unwrap();

    f.seek(SeekFrom::Start(0)).unwrap();
    let reader = PackageReader::open_ftt(f).unwrap();
    assert_eq!(reader.read_file("a.txt").unwrap(), b"one");
    assert_eq!(reader.read_file("dir/b.txt").unwrap(), b"two");
    assert_eq!(reader.ftt().len(), 2);
}

#[test]
fn invariant_protected_tag_write_fails_without_mutation() {
    let (w, mut f) = pack_with(TypeSize::COMMON);
    w.begin::<_, File>(&mut f, None).unwrap();
    w.pack_data(&mut f, "x".as_bytes(), "a.txt").unwrap();
    let before = w.ftt().tagset("a.txt").unwrap();

    let err = w.set_tag("a.txt", tid::PATH, &packfs::TagRaw::from_str_val("evil.txt")).unwrap_err();
    assert!(matches!(err, packfs::Error::Tag(_)));
    assert_eq!(w.ftt().tagset("a.txt").unwrap().data(), before.data());
}
