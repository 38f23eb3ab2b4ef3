//! Next/Prev scan order over multi-page files.

use strata_object::{DeallocList, ObjectSpec};
use strata_test::utils::{payload, TestVolume};

#[test]
fn test_insertion_order_across_pages() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = (0..60).map(|i| vol.create(&payload(i, 450))).collect();
    assert!(vol.pages().len() >= 7);

    let forward: Vec<_> = vol.scan_forward().unwrap().iter().map(|item| item.oid).collect();
    assert_eq!(forward, oids);

    let backward: Vec<_> = vol.scan_backward().unwrap().iter().map(|item| item.oid).collect();
    let mut reversed = oids.clone();
    reversed.reverse();
    assert_eq!(backward, reversed);

    let last = *oids.last().unwrap();
    assert!(vol.manager.next_object(vol.file, Some(last)).unwrap().is_none());
    assert!(vol.manager.prev_object(vol.file, Some(oids[0])).unwrap().is_none());
}

#[test]
fn test_scan_reports_headers() {
    let vol = TestVolume::in_memory();
    for i in 0..20u16 {
        let data = payload(i.into(), 100 + i as usize);
        let spec = ObjectSpec::new(&data).with_tag(i).with_properties(1);
        vol.manager.create_object(vol.file, None, &spec).unwrap();
    }

    for (i, item) in vol.scan_forward().unwrap().iter().enumerate() {
        assert_eq!(item.header.tag as usize, i);
        assert_eq!(item.header.length as usize, 100 + i);
        assert_eq!(item.header.properties, 1);
    }
}

#[test]
fn test_near_hint_keeps_neighbors_together() {
    let vol = TestVolume::in_memory();
    let a = vol.create(&payload(1, 2500));
    let b = vol.create(&payload(2, 2500));
    let a2 = vol.create_near(a, &payload(3, 2500));

    let forward: Vec<_> = vol.scan_forward().unwrap().iter().map(|item| item.oid).collect();
    assert_eq!(forward, vec![a, a2, b]);
}

#[test]
fn test_scan_after_page_removal() {
    let vol = TestVolume::in_memory();
    let oids: Vec<_> = (0..9).map(|i| vol.create(&payload(i, 1900))).collect();
    let pages_before = vol.pages().len();

    // Objects 2 and 3 share the second page.
    assert_eq!(oids[2].page_id(), oids[3].page_id());
    let mut dealloc = DeallocList::new();
    vol.manager.destroy_object(vol.file, oids[2], &mut dealloc).unwrap();
    vol.manager.destroy_object(vol.file, oids[3], &mut dealloc).unwrap();
    assert_eq!(vol.pages().len(), pages_before - 1);
    vol.manager.release(&mut dealloc).unwrap();

    let expected: Vec<_> = oids
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 2 && *i != 3)
        .map(|(_, oid)| *oid)
        .collect();
    let forward: Vec<_> = vol.scan_forward().unwrap().iter().map(|item| item.oid).collect();
    assert_eq!(forward, expected);
}
