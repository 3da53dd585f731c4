mod common;

use std::collections::VecDeque;

use common::{agent_with_outbox, drain_outbox, open_world, world_from_codes};
use deliveroo_bdi::options::find_common_delivery_tile;
use deliveroo_bdi::{OptionGenerator, Predicate, WorkerConfig};
use deliveroo_grid::{Parcel, Pos, Role};
use deliveroo_proto::{Behavior, CoordMessage, DeliveryTileStatus};

fn seed_parcel(world: &deliveroo_bdi::WorldState, id: &str, pos: Pos) {
    world.with_map_mut(|map| map.update_parcels(vec![Parcel::new(id, pos, 10, 0)], 0, 0));
}

#[test]
fn normal_mode_proposes_pickups_and_skips_ignored() {
    let world = open_world(Role::Leader, 6, 6);
    seed_parcel(&world, "P1", Pos::new(2, 0));
    seed_parcel(&world, "P2", Pos::new(0, 2));
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(Pos::new(0, 0));
    agent.with(|st| {
        st.parcels_to_ignore.insert("P1".to_string());
    });

    OptionGenerator::new(world.clone(), agent.clone()).generate();

    assert_eq!(
        agent.queued_predicates(),
        vec![Predicate::go_pick_up(Pos::new(0, 2), "P2")]
    );
}

#[test]
fn normal_mode_delivers_to_the_closest_depot_when_carrying() {
    // Depots at (5,0) and (2,0); the latter is closer to the agent.
    let mut codes = vec![3u8; 6 * 1];
    codes[5] = 2;
    codes[2] = 2;
    let world = world_from_codes(Role::Leader, 6, 1, &codes);
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(Pos::new(0, 0));
    agent.with(|st| st.carried_count = 1);

    OptionGenerator::new(world.clone(), agent.clone()).generate();

    assert_eq!(
        agent.queued_predicates(),
        vec![Predicate::go_drop_off(Pos::new(2, 0))]
    );
}

#[test]
fn normal_mode_repositions_to_a_spawn_when_idle() {
    let mut codes = vec![3u8; 5 * 5];
    codes[0] = 1; // (0,0)
    codes[4] = 1; // (4,0)
    let world = world_from_codes(Role::Leader, 5, 5, &codes);
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(Pos::new(2, 2));

    OptionGenerator::new(world.clone(), agent.clone()).generate();

    let queue = agent.queued_predicates();
    assert_eq!(queue.len(), 1);
    let target = queue[0].target();
    assert!(queue[0].is_go_to());
    assert!(target == Pos::new(0, 0) || target == Pos::new(4, 0));
}

#[test]
fn ignore_list_from_the_companion_suppresses_pickups() {
    // Scenario: the companion claimed P1 and P2 through multi_pickup.
    let world = open_world(Role::Follower, 6, 6);
    seed_parcel(&world, "P1", Pos::new(1, 0));
    seed_parcel(&world, "P2", Pos::new(2, 0));
    seed_parcel(&world, "P3", Pos::new(3, 0));
    let (agent, _outbox) =
        agent_with_outbox(WorkerConfig::new("a2", Role::Follower).with_companion("a1"));
    agent.set_position(Pos::new(0, 0));
    agent.with(|st| st.initialized = true);

    let coordinator = deliveroo_bdi::Coordinator::new(world.clone(), agent.clone());
    coordinator
        .handle_message(
            "a1",
            CoordMessage::MultiPickup {
                parcel_ids: vec!["P2".to_string(), "P1".to_string()],
            },
        )
        .unwrap();

    OptionGenerator::new(world.clone(), agent.clone()).generate();

    assert_eq!(
        agent.queued_predicates(),
        vec![Predicate::go_pick_up(Pos::new(3, 0), "P3")]
    );
}

#[test]
fn gather_mode_waits_for_the_delivery_tile() {
    let world = open_world(Role::Leader, 6, 6);
    seed_parcel(&world, "P1", Pos::new(1, 0));
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(Pos::new(0, 0));
    agent.with(|st| st.hand2hand = Behavior::Gather);

    OptionGenerator::new(world.clone(), agent.clone()).generate();
    assert!(agent.queued_predicates().is_empty());
}

#[test]
fn gather_mode_hauls_to_the_delivery_tile() {
    let world = open_world(Role::Leader, 6, 6);
    let delivery = Pos::new(3, 3);
    seed_parcel(&world, "ON_TILE", delivery);
    seed_parcel(&world, "P1", Pos::new(1, 0));
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(Pos::new(0, 0));
    agent.with(|st| {
        st.hand2hand = Behavior::Gather;
        st.delivery_tile = Some(delivery);
        st.carried_count = 1;
    });

    OptionGenerator::new(world.clone(), agent.clone()).generate();

    let queue = agent.queued_predicates();
    // Parcels already on the shared tile are left alone; the haul targets it.
    assert!(queue.contains(&Predicate::go_pick_up(Pos::new(1, 0), "P1")));
    assert!(queue.contains(&Predicate::go_drop_off(delivery)));
    assert!(!queue.iter().any(|p| p.is_pickup() && p.target() == delivery));
}

#[test]
fn deliver_mode_negotiates_then_ferries() {
    let world = open_world(Role::Follower, 6, 6);
    let depot = Pos::new(5, 0);
    let (agent, mut outbox) =
        agent_with_outbox(WorkerConfig::new("a2", Role::Follower).with_companion("a1"));
    agent.set_position(Pos::new(4, 0));
    agent.with(|st| {
        st.hand2hand = Behavior::Deliver;
        st.depot = Some(depot);
    });

    let generator = OptionGenerator::new(world.clone(), agent.clone());
    generator.generate();

    // Heads for the depot and proposes the first candidate (the depot).
    assert!(agent
        .queued_predicates()
        .contains(&Predicate::go_to(depot)));
    let proposals: Vec<CoordMessage> = drain_outbox(&mut outbox)
        .into_iter()
        .filter(|m| matches!(m, CoordMessage::DeliveryTile { .. }))
        .collect();
    assert_eq!(
        proposals,
        vec![CoordMessage::DeliveryTile {
            status: DeliveryTileStatus::Set,
            tile: Some(depot),
        }]
    );

    // Once a parcel sits on the agreed tile, only that pickup is proposed.
    seed_parcel(&world, "HANDED", depot);
    seed_parcel(&world, "ELSEWHERE", Pos::new(0, 5));
    generator.generate();
    let queue = agent.queued_predicates();
    assert!(queue.contains(&Predicate::go_pick_up(depot, "HANDED")));
    assert!(!queue.iter().any(|p| p.is_pickup() && p.target() == Pos::new(0, 5)));
}

#[test]
fn delivery_tile_search_walks_past_avoided_candidates() {
    let world = open_world(Role::Leader, 3, 1);
    let map = world.snapshot().unwrap();
    let mut avoid = vec![Pos::new(2, 0)];

    let found = find_common_delivery_tile(
        &map,
        Role::Leader,
        Pos::new(0, 0),
        &mut avoid,
        VecDeque::from([Pos::new(2, 0)]),
    );

    // The avoided candidate is skipped and its neighbour wins.
    assert_eq!(found, Some(Pos::new(1, 0)));
    assert!(avoid.contains(&Pos::new(2, 0)));
}

#[test]
fn delivery_tile_search_exhausts_to_none() {
    // Agent sealed off: nothing is reachable, every candidate is consumed.
    let codes = vec![3, 0, 3];
    let world = world_from_codes(Role::Leader, 3, 1, &codes);
    let map = world.snapshot().unwrap();
    let mut avoid = Vec::new();

    let found = find_common_delivery_tile(
        &map,
        Role::Leader,
        Pos::new(0, 0),
        &mut avoid,
        VecDeque::from([Pos::new(2, 0)]),
    );
    assert_eq!(found, None);
    assert!(avoid.contains(&Pos::new(2, 0)));
}
