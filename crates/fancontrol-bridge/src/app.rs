//! Wiring of the broker and units.

use std::time::Duration;

use tracing::{error, info};

use fancontrol_bus::{
    spawn_unit, BrokerConfig, BrokerHandle, BrokerThread, BusError, MessageBroker, StopSignal, Unit,
    UnitConfig, UnitHandle,
};
use fancontrol_protocol::Transport;

use crate::communicator::{CommunicatorConfig, FanControllerCommunicator};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::output::PrintOutput;
use crate::poller::StatusPoller;

trait RunningUnit {
    fn name(&self) -> &str;
    fn is_finished(&self) -> bool;
    fn join_boxed(self: Box<Self>) -> bool;
}

impl<U> RunningUnit for UnitHandle<U> {
    fn name(&self) -> &str {
        UnitHandle::name(self)
    }

    fn is_finished(&self) -> bool {
        UnitHandle::is_finished(self)
    }

    fn join_boxed(self: Box<Self>) -> bool {
        (*self).join().is_ok()
    }
}

/// A running bridge: the broker thread plus one thread per unit.
pub struct Bridge {
    handle: BrokerHandle,
    broker: BrokerThread,
    units: Vec<Box<dyn RunningUnit>>,
    stop: StopSignal,
}

impl Bridge {
    /// Control handle of the broker, for publishing or observing events.
    pub fn handle(&self) -> &BrokerHandle {
        &self.handle
    }

    /// Names of the running units.
    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Whether any thread has exited.
    pub fn any_finished(&self) -> bool {
        self.broker.is_finished() || self.units.iter().any(|u| u.is_finished())
    }

    /// Ask every loop to stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for every unit and the broker to exit.
    pub fn join(self) -> Result<(), BridgeError> {
        let mut panicked = None;
        for unit in self.units {
            let name = unit.name().to_string();
            if !unit.join_boxed() {
                error!(unit = %name, "unit thread panicked");
                panicked.get_or_insert(name);
            }
        }
        if self.broker.join().is_err() {
            error!("broker thread panicked");
            panicked.get_or_insert_with(|| "message-broker".to_string());
        }
        match panicked {
            Some(name) => Err(BridgeError::Panicked(name)),
            None => Ok(()),
        }
    }
}

fn start<U: Unit>(
    unit: U,
    handle: &BrokerHandle,
    config: UnitConfig,
    stop: &StopSignal,
    units: &mut Vec<Box<dyn RunningUnit>>,
) -> Result<(), BridgeError> {
    let running = spawn_unit(unit, handle, config, stop.clone())?;
    info!(unit = %running.name(), "started unit");
    units.push(Box::new(running));
    Ok(())
}

fn start_units<T>(
    config: &BridgeConfig,
    transport: T,
    handle: &BrokerHandle,
    stop: &StopSignal,
    units: &mut Vec<Box<dyn RunningUnit>>,
) -> Result<(), BridgeError>
where
    T: Transport + Send + 'static,
{
    let tick = Duration::from_millis(config.communicator.tick_ms);

    let comm_config = CommunicatorConfig::default()
        .with_command_event(config.communicator.command_event.clone())
        .with_max_tries(config.communicator.max_tries)
        .with_max_queue_len(config.communicator.max_queue_len);
    start(
        FanControllerCommunicator::new(transport, comm_config),
        handle,
        UnitConfig::default().with_tick(tick),
        stop,
        units,
    )?;

    if let Some(poller) = &config.poller {
        let event = poller
            .command_event
            .clone()
            .unwrap_or_else(|| config.communicator.command_event.clone());
        start(
            StatusPoller::new(event, poller.channels.clone()).with_commands(poller.commands.clone()),
            handle,
            UnitConfig::default()
                .with_tick(tick)
                .with_interval(poller.interval()?),
            stop,
            units,
        )?;
    }

    if let Some(print) = &config.print_output {
        start(
            PrintOutput::new(std::io::stdout(), print.events.clone()),
            handle,
            UnitConfig::default().with_tick(tick),
            stop,
            units,
        )?;
    }
    Ok(())
}

fn abort(stop: &StopSignal, units: Vec<Box<dyn RunningUnit>>) {
    stop.stop();
    for unit in units {
        unit.join_boxed();
    }
}

/// Start the broker and every configured unit.
///
/// Units attach to the broker before it starts delivering, so no event
/// published after this returns is missed by any of them. If anything fails
/// to start, the units already running are stopped before returning.
pub fn launch<T>(config: &BridgeConfig, transport: T, stop: StopSignal) -> Result<Bridge, BridgeError>
where
    T: Transport + Send + 'static,
{
    let (broker, handle) = MessageBroker::new(
        BrokerConfig::default().with_idle(Duration::from_millis(config.broker.idle_ms)),
    );

    let mut units = Vec::new();
    if let Err(e) = start_units(config, transport, &handle, &stop, &mut units) {
        abort(&stop, units);
        return Err(e);
    }

    let broker = match broker.spawn(stop.clone()) {
        Ok(thread) => thread,
        Err(e) => {
            abort(&stop, units);
            return Err(BridgeError::Bus(BusError::Spawn {
                name: "message-broker".to_string(),
                reason: e.to_string(),
            }));
        }
    };

    Ok(Bridge {
        handle,
        broker,
        units,
        stop,
    })
}
