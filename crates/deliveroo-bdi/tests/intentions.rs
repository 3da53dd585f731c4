mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{agent_with_outbox, open_world, world_from_codes, RecordingClient};
use deliveroo_bdi::{
    default_library, AgentError, Intention, IntentionState, Predicate, PlanContext, WorkerConfig,
};
use deliveroo_grid::{Parcel, Pos, Role};
use deliveroo_proto::Direction;

fn context(
    world: Arc<deliveroo_bdi::WorldState>,
    client: Arc<RecordingClient>,
    start: Pos,
) -> PlanContext {
    let (agent, _outbox) = agent_with_outbox(WorkerConfig::new("a1", Role::Leader));
    agent.set_position(start);
    PlanContext {
        world,
        agent,
        client,
        plans: default_library(),
    }
}

#[tokio::test]
async fn go_to_walks_the_path() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(2, 0)));
    let result = intention.achieve(&ctx).await;

    assert_eq!(result.unwrap(), true);
    assert_eq!(intention.state(), IntentionState::Completed);
    assert_eq!(
        *client.moves.lock().unwrap(),
        vec![Direction::Right, Direction::Right]
    );
    assert_eq!(ctx.agent.position(), Some(Pos::new(2, 0)));
}

#[tokio::test]
async fn achieve_is_idempotent() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(2, 0)));
    assert!(intention.achieve(&ctx).await.unwrap());
    let moves_after_first = client.move_count();

    // Re-achieving returns the cached value without touching the client.
    assert!(intention.achieve(&ctx).await.unwrap());
    assert_eq!(client.move_count(), moves_after_first);
}

#[tokio::test]
async fn stop_before_achieve_emits_nothing() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(2, 0)));
    intention.stop();

    assert!(matches!(
        intention.achieve(&ctx).await,
        Err(AgentError::Stopped)
    ));
    assert_eq!(intention.state(), IntentionState::Stopped);
    assert_eq!(client.move_count(), 0);
}

#[tokio::test]
async fn stop_mid_execution_cuts_the_route_short() {
    let world = open_world(Role::Leader, 5, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(4, 0)));
    // The stop arrives while the first move is in flight.
    *client.cancel_on_move.lock().unwrap() = Some(intention.token().clone());

    assert!(matches!(
        intention.achieve(&ctx).await,
        Err(AgentError::Stopped)
    ));
    // The in-flight move is the last externally visible action.
    assert_eq!(client.move_count(), 1);
}

#[tokio::test]
async fn pick_up_composes_a_route_sub_intention() {
    let world = open_world(Role::Leader, 3, 1);
    world.with_map_mut(|map| {
        map.update_parcels(vec![Parcel::new("p1", Pos::new(2, 0), 9, 0)], 0, 0)
    });
    let client = RecordingClient::new();
    let ctx = context(world.clone(), client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_pick_up(Pos::new(2, 0), "p1"));
    assert!(intention.achieve(&ctx).await.unwrap());

    assert_eq!(client.move_count(), 2);
    assert_eq!(*client.pickups.lock().unwrap(), 1);
    assert!(ctx.agent.carrying());
    // The picked parcel left the belief map.
    assert!(world.with_map(|m| m.parcels().is_empty()).unwrap());
}

#[tokio::test]
async fn drop_off_resets_the_carry_state() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));
    ctx.agent.with(|st| st.carried_count = 3);

    let mut intention = Intention::new(Predicate::go_drop_off(Pos::new(2, 0)));
    assert!(intention.achieve(&ctx).await.unwrap());

    assert_eq!(*client.putdowns.lock().unwrap(), 1);
    assert!(!ctx.agent.carrying());
}

#[tokio::test]
async fn refused_pickup_fails_the_intention() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    client.refuse_pickup.store(true, Ordering::SeqCst);
    let ctx = context(world, client.clone(), Pos::new(2, 0));

    let mut intention = Intention::new(Predicate::go_pick_up(Pos::new(2, 0), "p1"));
    assert!(matches!(
        intention.achieve(&ctx).await,
        Err(AgentError::NoPlan(_))
    ));
    assert!(!ctx.agent.carrying());
}

#[tokio::test]
async fn unreachable_goal_surfaces_no_plan() {
    let codes = vec![3, 0, 3];
    let world = world_from_codes(Role::Leader, 3, 1, &codes);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(0, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(2, 0)));
    assert!(matches!(
        intention.achieve(&ctx).await,
        Err(AgentError::NoPlan(_))
    ));
    assert_eq!(client.move_count(), 0);
}

#[tokio::test]
async fn already_there_succeeds_without_moving() {
    let world = open_world(Role::Leader, 3, 1);
    let client = RecordingClient::new();
    let ctx = context(world, client.clone(), Pos::new(1, 0));

    let mut intention = Intention::new(Predicate::go_to(Pos::new(1, 0)));
    assert!(intention.achieve(&ctx).await.unwrap());
    assert_eq!(client.move_count(), 0);
}
