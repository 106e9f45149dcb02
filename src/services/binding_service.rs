//! Input-to-coil binding.
//!
//! `DigitalBinding` reads one discrete input every iteration and writes its
//! value to one coil whenever it differs from the value last written. The
//! reads also serve as the keep-alive traffic the device expects, so the
//! loop never idles and never paces itself.
//!
//! Any failed transaction ends the binding. `run_binding` owns the connection
//! and closes it exactly once, whichever way the loop ends.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::future::Future;

use crate::config::Config;
use crate::modbus::client::{ModbusClientTrait, ModbusTcpClient};
use crate::modbus::protocol::ModbusRequest;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Init,
    Polling,
    Terminated,
}

/// Result of one read/compare/write iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged(bool),
    Written(bool),
}

/// How the loop stopped when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct BindingStats {
    pub started_at: DateTime<Utc>,
    pub reads: u64,
    pub writes: u64,
    pub last_change_at: Option<DateTime<Utc>>,
}

impl BindingStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            reads: 0,
            writes: 0,
            last_change_at: None,
        }
    }
}

pub struct DigitalBinding {
    input_ref: u16,
    output_ref: u16,
    unit_id: u8,
    debug: bool,
    last_written_output: bool,
    state: BindingState,
    stats: BindingStats,
}

impl DigitalBinding {
    pub fn new(config: &Config) -> Self {
        Self {
            input_ref: config.input_ref,
            output_ref: config.output_ref,
            unit_id: config.unit_id,
            debug: config.debug,
            last_written_output: false,
            state: BindingState::Init,
            stats: BindingStats::new(),
        }
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    /// The value most recently confirmed written to the coil.
    pub fn last_written_output(&self) -> bool {
        self.last_written_output
    }

    pub fn stats(&self) -> &BindingStats {
        &self.stats
    }

    /// Runs one iteration: read the input, then write the coil if it changed.
    ///
    /// An error moves the binding to `Terminated`; no further polls are made.
    pub async fn poll_once<C>(&mut self, client: &mut C) -> Result<PollOutcome, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
    {
        if self.state == BindingState::Terminated {
            return Err(ModbusError::BindingTerminated);
        }
        self.state = BindingState::Polling;

        match self.step(client).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.state = BindingState::Terminated;
                Err(err)
            }
        }
    }

    async fn step<C>(&mut self, client: &mut C) -> Result<PollOutcome, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
    {
        let read = ModbusRequest::read_discrete_input(self.unit_id, self.input_ref);
        let current_input = client.execute(&read).await?.discrete_status(0)?;
        self.stats.reads += 1;

        if current_input == self.last_written_output {
            return Ok(PollOutcome::Unchanged(current_input));
        }

        let write = ModbusRequest::write_coil(self.unit_id, self.output_ref, current_input);
        client.execute(&write).await?;

        self.last_written_output = current_input;
        self.stats.writes += 1;
        self.stats.last_change_at = Some(Utc::now());
        if self.debug {
            debug!("Updated coil with state from DI.");
        }

        Ok(PollOutcome::Written(current_input))
    }

    /// Polls until a transaction fails or `shutdown` completes.
    pub async fn run<C, F>(&mut self, client: &mut C, shutdown: F) -> Result<LoopExit, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "🔁 Binding discrete input {} -> coil {} (unit {})",
            self.input_ref, self.output_ref, self.unit_id
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("🛑 Stopping binding...");
                    return Ok(LoopExit::Interrupted);
                }
                result = self.poll_once(client) => {
                    result?;
                }
            }
        }
    }
}

/// Drives `binding` on an already open connection and releases it afterwards.
///
/// A close failure is logged and dropped; it never replaces the loop's result.
pub async fn drive<C, F>(
    binding: &mut DigitalBinding,
    client: &mut C,
    shutdown: F,
) -> Result<LoopExit, ModbusError>
where
    C: ModbusClientTrait + ?Sized,
    F: Future<Output = ()>,
{
    let outcome = binding.run(client, shutdown).await;

    if let Err(err) = client.close().await {
        warn!("⚠️  {}", err);
    }

    let stats = binding.stats();
    info!("📊 Final Statistics:");
    info!("   ⏱️  Running since: {}", stats.started_at.format("%Y-%m-%d %H:%M:%S"));
    info!("   📥 Reads: {}", stats.reads);
    info!("   📤 Writes: {}", stats.writes);
    if let Some(changed) = stats.last_change_at {
        info!("   🔀 Last change: {}", changed.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Err(err) = &outcome {
        error!("💥 Binding terminated: {}", err);
    }
    outcome
}

/// Resolves the endpoint, opens the single connection and runs the binding on it.
pub async fn run_binding<F>(config: &Config, shutdown: F) -> Result<LoopExit, ModbusError>
where
    F: Future<Output = ()>,
{
    let addr = config.endpoint.resolve().await?;
    let mut client = ModbusTcpClient::connect(addr, config.unit_id, config.client_options()).await?;
    if config.debug {
        debug!("Connected to {}", client.peer_addr());
    }

    let mut binding = DigitalBinding::new(config);
    drive(&mut binding, &mut client, shutdown).await
}
