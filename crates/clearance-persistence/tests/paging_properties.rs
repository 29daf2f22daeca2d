//! Paging through packages visits every package exactly once

use std::collections::BTreeSet;

use clearance_domain::{
    entities::ScanStatus,
    query::{ListQuery, PackageFilter, PackageSortBy, Pagination, SortOrder},
    repositories::PackageRepository,
    Purl,
};
use clearance_persistence::InMemoryStore;
use proptest::prelude::*;

fn store_with(names: &BTreeSet<String>) -> InMemoryStore {
    let store = InMemoryStore::new();
    tokio_test::block_on(async {
        for name in names {
            let purl = Purl::parse(&format!("pkg:npm/{}@1.0.0", name)).unwrap();
            PackageRepository::upsert(&store, &purl, ScanStatus::Scanned)
                .await
                .unwrap();
        }
    });
    store
}

proptest! {
    #[test]
    fn test_pages_cover_all_packages(
        names in prop::collection::btree_set("[a-z]{1,8}", 0..40),
        page_size in 1u32..10,
        descending in any::<bool>(),
    ) {
        let store = store_with(&names);
        let order = if descending { SortOrder::Desc } else { SortOrder::Asc };

        let mut seen = Vec::new();
        let mut page_index = 0;
        loop {
            let query = ListQuery {
                filter: PackageFilter::default(),
                sort_by: Some(PackageSortBy::Name),
                sort_order: order,
                pagination: Pagination::new(page_index, Some(page_size)),
            };
            let page = tokio_test::block_on(PackageRepository::list(&store, &query)).unwrap();
            prop_assert!(page.len() <= page_size as usize);
            if page.is_empty() {
                break;
            }
            seen.extend(page.into_iter().map(|p| p.name));
            page_index += 1;
        }

        let mut expected: Vec<String> = names.iter().cloned().collect();
        if descending {
            expected.reverse();
        }
        prop_assert_eq!(seen, expected);

        let count = tokio_test::block_on(PackageRepository::count(&store, &PackageFilter::default())).unwrap();
        prop_assert_eq!(count, names.len() as u64);
    }
}
