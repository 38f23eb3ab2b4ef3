//! Create, read, destroy, and compaction behavior through the public API.

use strata_common::config::StorageConfig;
use strata_object::{DeallocList, ObjectError, ObjectSpec};
use strata_storage::page::{aligned_length, SlottedPage};
use strata_test::utils::{payload, TestVolume};

#[test]
fn test_three_small_objects_are_packed() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = [10usize, 7, 5].iter().map(|&len| vol.create(&payload(1, len))).collect();

    let page_id = oids[0].page_id();
    assert!(oids.iter().all(|oid| oid.page_id() == page_id));

    let guard = vol.manager.pool().fetch_page(page_id).unwrap();
    let data = guard.data();
    let page = SlottedPage::new(&data[..]);
    let offsets: Vec<_> = (0..3).map(|slot| page.slot(slot).unwrap().offset).collect();
    assert_eq!(offsets, vec![0, 20, 36]);
    assert_eq!(page.free(), 52);
    assert_eq!(page.unused(), 0);
}

#[test]
fn test_round_trip_many_lengths() {
    let vol = TestVolume::in_memory();
    for len in (0..64).chain([255, 256, 1000, 4000]) {
        let data = payload(len as u32, len);
        let spec = ObjectSpec::new(&data).with_tag(len as u16).with_properties(0x5A);
        let oid = vol.manager.create_object(vol.file, None, &spec).unwrap();

        assert_eq!(vol.read(oid), data);
        let header = vol.manager.object_header(vol.file, oid).unwrap();
        assert_eq!(header.length as usize, len);
        assert_eq!(header.tag, len as u16);
        assert_eq!(header.properties, 0x5A);
    }
    vol.manager.verify_file(vol.file).unwrap();
}

#[test]
fn test_largest_object_fills_a_page() {
    let vol = TestVolume::in_memory();
    let oid = vol.create(&payload(9, 4032));
    assert_eq!(vol.manager.page_stats(oid.page_id()).unwrap().contiguous_free, 0);

    let err = vol
        .manager
        .create_object(vol.file, None, &ObjectSpec::new(&payload(9, 4033)))
        .unwrap_err();
    assert!(err.is_parameter_error());
    assert!(matches!(err, ObjectError::LargeObjectUnsupported { .. }));
}

#[test]
fn test_parameter_errors_leave_file_untouched() {
    let vol = TestVolume::in_memory();
    vol.create(b"keep");
    let before = vol.manager.page_stats(vol.pages()[0]).unwrap();

    let bad = ObjectSpec {
        properties: 0,
        tag: 0,
        length: 8,
        data: Some(b"short"),
    };
    assert!(matches!(
        vol.manager.create_object(vol.file, None, &bad),
        Err(ObjectError::BadUserBuffer)
    ));
    assert_eq!(vol.manager.page_stats(vol.pages()[0]).unwrap(), before);
}

#[test]
fn test_slot_reuse_mints_new_tag() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = (0..4).map(|i| vol.create(&payload(i, 40))).collect();

    let mut dealloc = DeallocList::new();
    vol.manager.destroy_object(vol.file, oids[1], &mut dealloc).unwrap();
    let reused = vol.create(&payload(99, 12));

    assert_eq!(reused.page_id(), oids[1].page_id());
    assert_eq!(reused.slot, oids[1].slot);
    assert_ne!(reused.unique, oids[1].unique);
    assert!(matches!(
        vol.manager.read_object(vol.file, oids[1], 0, None),
        Err(ObjectError::BadObjectId { .. })
    ));
    assert_eq!(vol.read(reused), payload(99, 12));
}

#[test]
fn test_compaction_preserves_objects() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = (0..10).map(|i| vol.create(&payload(i, 30 + i as usize * 7))).collect();
    let page_id = oids[0].page_id();

    let mut dealloc = DeallocList::new();
    for oid in oids.iter().step_by(3) {
        vol.manager.destroy_object(vol.file, *oid, &mut dealloc).unwrap();
    }
    let stats = vol.manager.page_stats(page_id).unwrap();
    assert!(stats.unused > 0);

    let reclaimed = vol.manager.compact_page(vol.file, page_id, Some(oids[4].slot)).unwrap();
    assert_eq!(reclaimed, stats.unused);

    let stats = vol.manager.page_stats(page_id).unwrap();
    assert_eq!(stats.unused, 0);
    let live: usize = oids
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(i, _)| 8 + aligned_length(30 + i * 7))
        .sum();
    assert_eq!(stats.free, live);

    for (i, oid) in oids.iter().enumerate().filter(|(i, _)| i % 3 != 0) {
        assert_eq!(vol.read(*oid), payload(i as u32, 30 + i * 7));
    }
    vol.manager.verify_file(vol.file).unwrap();

    // The designated object now borders the free region.
    let guard = vol.manager.pool().fetch_page(page_id).unwrap();
    let data = guard.data();
    let page = SlottedPage::new(&data[..]);
    let last = page.slot(oids[4].slot).unwrap();
    assert_eq!(
        last.offset as usize + page.object_header(oids[4].slot).unwrap().stored_size(),
        page.free()
    );
}

#[test]
fn test_compaction_is_idempotent() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = (0..6).map(|i| vol.create(&payload(i, 50))).collect();
    let mut dealloc = DeallocList::new();
    vol.manager.destroy_object(vol.file, oids[2], &mut dealloc).unwrap();

    let page_id = oids[0].page_id();
    vol.manager.compact_page(vol.file, page_id, None).unwrap();
    let offsets = |vol: &TestVolume| -> Vec<u16> {
        let guard = vol.manager.pool().fetch_page(page_id).unwrap();
        let data = guard.data();
        let page = SlottedPage::new(&data[..]);
        page.live_slots().map(|(_, slot)| slot.offset).collect()
    };
    let first = offsets(&vol);
    assert_eq!(vol.manager.compact_page(vol.file, page_id, None).unwrap(), 0);
    assert_eq!(offsets(&vol), first);
}

#[test]
fn test_page_lifecycle() {
    let vol = TestVolume::in_memory();
    let a = vol.create(&payload(1, 3000));
    let b = vol.create(&payload(2, 3000));
    let c = vol.create(&payload(3, 3000));
    assert_eq!(vol.pages(), vec![a.page_id(), b.page_id(), c.page_id()]);

    let mut dealloc = DeallocList::new();
    vol.manager.destroy_object(vol.file, b, &mut dealloc).unwrap();
    assert_eq!(vol.pages(), vec![a.page_id(), c.page_id()]);
    assert_eq!(dealloc.len(), 1);

    vol.manager.destroy_object(vol.file, a, &mut dealloc).unwrap();
    assert_eq!(vol.pages(), vec![a.page_id(), c.page_id()]);
    assert_eq!(dealloc.len(), 1);

    let released = vol.manager.release(&mut dealloc).unwrap();
    assert_eq!(released, 1);
    assert!(!vol.manager.allocator().is_allocated(b.page_id()));
    vol.manager.verify_file(vol.file).unwrap();
}

#[test]
fn test_fill_factor_spreads_pages() {
    let config = StorageConfig {
        extent_size: 4,
        ..StorageConfig::for_testing()
    };
    let vol = TestVolume::with_config(config);
    let sparse = vol.manager.create_file(Some(50)).unwrap();

    for i in 0..6 {
        vol.manager
            .create_object(sparse, None, &ObjectSpec::new(&payload(i, 3000)))
            .unwrap();
    }

    let pages = vol.manager.file_pages(sparse).unwrap();
    assert_eq!(pages.len(), 6);
    let mut per_extent = std::collections::HashMap::new();
    for page_id in &pages {
        *per_extent
            .entry(vol.manager.allocator().extent_of(*page_id))
            .or_insert(0) += 1;
    }
    assert!(per_extent.values().all(|&count| count <= 2));
}
