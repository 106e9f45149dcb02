use async_trait::async_trait;
use log::{info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;

use super::protocol::{ModbusRequest, ModbusResponse};
use crate::utils::error::ModbusError;

/// Per-transaction timeout of the transport when nothing else is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Executes request/response exchanges over one owned connection.
///
/// Every method takes `&mut self`, so a caller can never have two
/// transactions outstanding on the same connection.
#[async_trait]
pub trait ModbusClientTrait: Send {
    async fn execute(&mut self, request: &ModbusRequest) -> Result<ModbusResponse, ModbusError>;

    /// Releases the connection. Calling it again after a successful close is a no-op.
    async fn close(&mut self) -> Result<(), ModbusError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Re-open the session and retry once after a transport failure.
    pub reconnect_on_failure: bool,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect_on_failure: false,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

pub struct ModbusTcpClient {
    addr: SocketAddr,
    unit_id: u8,
    options: ClientOptions,
    ctx: Option<Context>,
}

impl ModbusTcpClient {
    pub async fn connect(
        addr: SocketAddr,
        unit_id: u8,
        options: ClientOptions,
    ) -> Result<Self, ModbusError> {
        info!("🔌 Connecting to Modbus TCP device at {}", addr);
        let ctx = Self::open(addr, unit_id, options.timeout).await?;
        info!("✅ Modbus TCP connection established");

        Ok(Self {
            addr,
            unit_id,
            options,
            ctx: Some(ctx),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    async fn open(addr: SocketAddr, unit_id: u8, limit: Duration) -> Result<Context, ModbusError> {
        match timeout(limit, tcp::connect_slave(addr, Slave(unit_id))).await {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(e)) => Err(ModbusError::ConnectionError(format!(
                "Failed to connect to {}: {}",
                addr, e
            ))),
            Err(_) => Err(ModbusError::ConnectionError(format!(
                "Timed out connecting to {} after {:?}",
                addr, limit
            ))),
        }
    }

    async fn reconnect(&mut self) -> Result<(), ModbusError> {
        if let Some(mut stale) = self.ctx.take() {
            if let Err(e) = stale.disconnect().await {
                warn!("⚠️  Closing stale connection to {} failed: {}", self.addr, e);
            }
        }
        let ctx = Self::open(self.addr, self.unit_id, self.options.timeout).await?;
        self.ctx = Some(ctx);
        info!("✅ Reconnected to {}", self.addr);
        Ok(())
    }

    async fn transact(
        ctx: &mut Context,
        request: &ModbusRequest,
        limit: Duration,
    ) -> Result<ModbusResponse, ModbusError> {
        ctx.set_slave(Slave(request.unit_id()));
        let function = request.function_code();

        match *request {
            ModbusRequest::ReadDiscreteInputs { reference, quantity, .. } => {
                let bits = timeout(limit, ctx.read_discrete_inputs(reference, quantity))
                    .await??
                    .map_err(|code| ModbusError::Exception {
                        function,
                        code: format!("{:?}", code),
                    })?;
                Ok(ModbusResponse::DiscreteInputs(bits))
            }
            ModbusRequest::WriteSingleCoil { reference, value, .. } => {
                timeout(limit, ctx.write_single_coil(reference, value))
                    .await??
                    .map_err(|code| ModbusError::Exception {
                        function,
                        code: format!("{:?}", code),
                    })?;
                Ok(ModbusResponse::CoilWritten { reference, value })
            }
        }
    }
}

#[async_trait]
impl ModbusClientTrait for ModbusTcpClient {
    async fn execute(&mut self, request: &ModbusRequest) -> Result<ModbusResponse, ModbusError> {
        let limit = self.options.timeout;
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| ModbusError::ConnectionError("connection is closed".to_string()))?;

        match Self::transact(ctx, request, limit).await {
            Err(err) if err.is_transport_failure() && self.options.reconnect_on_failure => {
                warn!("🔄 {} failed ({}), reconnecting to {}", request, err, self.addr);
                self.reconnect().await?;
                let ctx = self
                    .ctx
                    .as_mut()
                    .ok_or_else(|| ModbusError::ConnectionError("connection is closed".to_string()))?;
                Self::transact(ctx, request, limit).await
            }
            result => result,
        }
    }

    async fn close(&mut self) -> Result<(), ModbusError> {
        let Some(mut ctx) = self.ctx.take() else {
            return Ok(());
        };

        ctx.disconnect()
            .await
            .map_err(|e| ModbusError::CleanupError(format!("{}: {}", self.addr, e)))?;
        info!("🔌 Connection to {} closed", self.addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::protocol::FC_READ_DISCRETE_INPUTS;
    use crate::utils::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// What the loopback device does with one accepted session.
    enum Session {
        /// Reads the request, then hangs up without answering.
        HangUp,
        /// Answers a discrete-input read with one status bit.
        Status(bool),
        /// Answers with a Modbus exception frame.
        Exception(u8),
    }

    async fn read_frame(stream: &mut TcpStream) -> std::io::Result<([u8; 7], Vec<u8>)> {
        let mut header = [0u8; 7];
        stream.read_exact(&mut header).await?;
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut pdu = vec![0u8; length.saturating_sub(1)];
        stream.read_exact(&mut pdu).await?;
        Ok((header, pdu))
    }

    fn frame(header: &[u8; 7], pdu: &[u8]) -> Vec<u8> {
        let mut out = vec![header[0], header[1], 0x00, 0x00];
        out.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        out.push(header[6]);
        out.extend_from_slice(pdu);
        out
    }

    /// Serves one session per script entry, then hands the listener back so
    /// the test can check whether any further connection was attempted.
    fn spawn_device(
        listener: TcpListener,
        script: Vec<Session>,
    ) -> JoinHandle<(TcpListener, Vec<TcpStream>)> {
        tokio::spawn(async move {
            let mut open = Vec::new();
            for session in script {
                let (mut stream, _) = listener.accept().await.unwrap();
                let (header, request) = read_frame(&mut stream).await.unwrap();
                match session {
                    Session::HangUp => drop(stream),
                    Session::Status(bit) => {
                        let pdu = [request[0], 0x01, bit as u8];
                        stream.write_all(&frame(&header, &pdu)).await.unwrap();
                        open.push(stream);
                    }
                    Session::Exception(code) => {
                        let pdu = [request[0] | 0x80, code];
                        stream.write_all(&frame(&header, &pdu)).await.unwrap();
                        open.push(stream);
                    }
                }
            }
            (listener, open)
        })
    }

    async fn assert_no_further_connect(listener: &TcpListener) {
        let pending = timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(pending.is_err(), "client opened another connection");
    }

    #[test]
    fn test_default_options_do_not_reconnect() {
        let options = ClientOptions::default();
        assert!(!options.reconnect_on_failure);
        assert_eq!(options.timeout, Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await });

        let mut client = ModbusTcpClient::connect(addr, 0, ClientOptions::default())
            .await
            .unwrap();
        assert!(client.is_open());
        assert_eq!(client.peer_addr(), addr);

        let _peer = accept.await.unwrap().unwrap();

        client.close().await.unwrap();
        assert!(!client.is_open());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_after_close_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await });

        let mut client = ModbusTcpClient::connect(addr, 0, ClientOptions::default())
            .await
            .unwrap();
        let _peer = accept.await.unwrap().unwrap();
        client.close().await.unwrap();

        let result = client
            .execute(&ModbusRequest::read_discrete_input(0, 0))
            .await;
        assert!(matches!(result, Err(ModbusError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ModbusTcpClient::connect(addr, 0, ClientOptions::default()).await;
        assert!(matches!(result, Err(ModbusError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_read_against_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await });

        let options = ClientOptions {
            reconnect_on_failure: false,
            timeout: Duration::from_millis(100),
        };
        let mut client = ModbusTcpClient::connect(addr, 0, options).await.unwrap();
        let _peer = accept.await.unwrap().unwrap();

        let result = client
            .execute(&ModbusRequest::read_discrete_input(0, 4))
            .await;
        assert!(matches!(result, Err(ModbusError::Timeout)));
        let _ = client.close().await;
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn test_reconnects_once_after_dropped_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = spawn_device(listener, vec![Session::HangUp, Session::Status(true)]);

        let options = ClientOptions {
            reconnect_on_failure: true,
            ..ClientOptions::default()
        };
        let mut client = ModbusTcpClient::connect(addr, 0, options).await.unwrap();

        let result = client
            .execute(&ModbusRequest::read_discrete_input(0, 4))
            .await
            .unwrap();
        assert_eq!(result, ModbusResponse::DiscreteInputs(vec![true]));

        let (listener, _open) = device.await.unwrap();
        assert_no_further_connect(&listener).await;
        let _ = client.close().await;
    }

    #[tokio::test]
    async fn test_dropped_session_is_an_error_without_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = spawn_device(listener, vec![Session::HangUp]);

        let mut client = ModbusTcpClient::connect(addr, 0, ClientOptions::default())
            .await
            .unwrap();

        let err = client
            .execute(&ModbusRequest::read_discrete_input(0, 4))
            .await
            .unwrap_err();
        assert!(err.is_transport_failure());
        assert_eq!(err.kind(), ErrorKind::Transaction);

        let (listener, _open) = device.await.unwrap();
        assert_no_further_connect(&listener).await;
        let _ = client.close().await;
    }

    #[tokio::test]
    async fn test_exception_response_is_never_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = spawn_device(listener, vec![Session::Exception(0x02)]);

        let options = ClientOptions {
            reconnect_on_failure: true,
            ..ClientOptions::default()
        };
        let mut client = ModbusTcpClient::connect(addr, 0, options).await.unwrap();

        let result = client
            .execute(&ModbusRequest::read_discrete_input(0, 4))
            .await;
        assert!(matches!(
            result,
            Err(ModbusError::Exception { function: FC_READ_DISCRETE_INPUTS, .. })
        ));

        let (listener, _open) = device.await.unwrap();
        assert_no_further_connect(&listener).await;
        let _ = client.close().await;
    }
}
