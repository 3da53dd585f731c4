use std::sync::Arc;

use deliveroo_proto::{GameClient, SensorEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{run_agent_loop, AgentHandle};
use crate::config::WorkerConfig;
use crate::error::AgentError;
use crate::observer::Observer;
use crate::options::OptionGenerator;
use crate::plans::{default_library, PlanContext};
use crate::world::WorldState;

/// Wire one courier together and run it until the sensor stream ends or a
/// fatal error breaks the coordination assumptions.
///
/// Everything runs on the caller's runtime: the event consumer (this
/// future), the agent loop, the option timer and the outbox drain. Pin the
/// worker to a current-thread runtime to keep the cooperative,
/// single-owner scheduling model.
pub async fn run_worker(
    client: Arc<dyn GameClient>,
    mut events: mpsc::UnboundedReceiver<SensorEvent>,
    config: WorkerConfig,
) -> Result<(), AgentError> {
    let cfg = Arc::new(config);
    info!(agent = %cfg.agent_id, role = ?cfg.role, dual = cfg.dual_agent, "worker starting");

    let world = WorldState::new(cfg.role);
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    let agent = AgentHandle::new(cfg.clone(), outbox_tx);
    let options = Arc::new(OptionGenerator::new(world.clone(), agent.clone()));
    let observer = Observer::new(world.clone(), agent.clone(), options.clone());
    let ctx = Arc::new(PlanContext {
        world: world.clone(),
        agent: agent.clone(),
        client: client.clone(),
        plans: default_library(),
    });

    let shutdown = CancellationToken::new();

    let say_client = client.clone();
    let say_cfg = cfg.clone();
    let say_shutdown = shutdown.clone();
    let outbox_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                m = outbox_rx.recv() => m,
                _ = say_shutdown.cancelled() => None,
            };
            let Some(message) = message else { return };
            let Some(to) = say_cfg.companion_id.as_deref() else {
                continue;
            };
            if let Err(err) = say_client.emit_say(to, &message).await {
                warn!(%err, "say failed");
            }
        }
    });

    let loop_task = tokio::spawn(run_agent_loop(agent.clone(), ctx, shutdown.clone()));

    let timer_options = options.clone();
    let timer_shutdown = shutdown.clone();
    let interval = cfg.option_generation_interval;
    let timer_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => timer_options.generate(),
                _ = timer_shutdown.cancelled() => return,
            }
        }
    });

    let result = loop {
        let Some(event) = events.recv().await else {
            break Ok(());
        };
        let disconnected = matches!(event, SensorEvent::Disconnected);
        if let Err(err) = observer.handle_event(event) {
            if err.is_fatal() {
                break Err(err);
            }
            warn!(%err, "sensor event rejected");
        }
        if disconnected {
            break Ok(());
        }
    };

    shutdown.cancel();
    let _ = tokio::join!(outbox_task, loop_task, timer_task);
    info!(agent = %cfg.agent_id, ok = result.is_ok(), "worker stopped");
    result
}
