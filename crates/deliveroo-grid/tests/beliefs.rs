use deliveroo_grid::{GridMap, Parcel, Pos, Role};

#[test]
fn expired_parcels_are_forgotten_on_update() {
    let mut map = GridMap::from_codes(3, 3, &[3; 9]).unwrap();
    map.update_parcels(vec![Parcel::new("p1", Pos::new(1, 1), 5, 0)], 0, 1000);
    assert_eq!(map.parcels().len(), 1);

    // reward 5, decay 1s: at t=6000 the decayed reward is -1.
    map.update_parcels(vec![], 6000, 1000);
    assert!(map.parcels().is_empty());
}

#[test]
fn parcel_ids_stay_unique() {
    let mut map = GridMap::from_codes(3, 3, &[3; 9]).unwrap();
    map.update_parcels(
        vec![
            Parcel::new("p1", Pos::new(0, 0), 5, 100),
            Parcel::new("p2", Pos::new(1, 0), 5, 100),
        ],
        100,
        1000,
    );
    map.update_parcels(vec![Parcel::new("p1", Pos::new(2, 2), 4, 200)], 200, 1000);

    assert_eq!(map.parcels().len(), 2);
    let p1 = map.parcels().iter().find(|p| p.id == "p1").unwrap();
    assert_eq!(p1.pos, Pos::new(2, 2));
}

#[test]
fn picked_up_parcel_leaves_the_map() {
    let mut map = GridMap::from_codes(3, 3, &[3; 9]).unwrap();
    map.update_parcels(vec![Parcel::new("p1", Pos::new(1, 1), 5, 0)], 0, 1000);
    map.parcel_picked_up("p1");
    assert!(map.parcels().is_empty());
}

#[test]
fn directional_facts_cover_adjacent_walkables() {
    // 2x1 strip: exactly one left/right pair.
    let map = GridMap::from_codes(2, 1, &[3, 3]).unwrap();
    let facts = map.directional_facts(Role::Leader);
    assert!(facts.contains(&"right tile1_0 tile0_0".to_string()));
    assert!(facts.contains(&"left tile0_0 tile1_0".to_string()));
    assert_eq!(facts.len(), 2);
}
