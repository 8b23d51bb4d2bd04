#![allow(dead_code)]
//! Scripted name server for integration tests.
//!
//! Listens on UDP and TCP on the same loopback port and answers every query
//! through a caller-supplied closure.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::oneshot;

use descent::dns::Soa;
use descent::transport::Protocol;
use descent::{
    ClientOptions, Message, NameServerAddress, Question, RData, Record, RecordType, ResponseCode,
};

pub enum Reply {
    Message(Message),
    Raw(Vec<u8>),
    /// Send nothing (UDP) or close the connection (TCP).
    Drop,
}

type Handler = Arc<dyn Fn(&Message, Protocol) -> Reply + Send + Sync>;

pub struct MockNameServer {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<(Question, Protocol)>>>,
    shutdown_tx: Vec<oneshot::Sender<()>>,
}

impl MockNameServer {
    /// Start on 127.0.0.1 with an ephemeral port.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Message, Protocol) -> Reply + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        for _ in 0..16 {
            let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let addr = udp.local_addr().unwrap();
            if let Ok(tcp) = TcpListener::bind(addr).await {
                return Self::run(udp, tcp, handler);
            }
        }
        panic!("no free loopback port for UDP and TCP");
    }

    /// Start on a specific loopback address and port.
    pub async fn start_on<F>(addr: SocketAddr, handler: F) -> io::Result<Self>
    where
        F: Fn(&Message, Protocol) -> Reply + Send + Sync + 'static,
    {
        let udp = UdpSocket::bind(addr).await?;
        let tcp = TcpListener::bind(addr).await?;
        Ok(Self::run(udp, tcp, Arc::new(handler)))
    }

    fn run(udp: UdpSocket, tcp: TcpListener, handler: Handler) -> Self {
        let addr = udp.local_addr().unwrap();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let (udp_tx, udp_rx) = oneshot::channel();
        let (tcp_tx, tcp_rx) = oneshot::channel();

        tokio::spawn(serve_udp(udp, handler.clone(), queries.clone(), udp_rx));
        tokio::spawn(serve_tcp(tcp, handler, queries.clone(), tcp_rx));

        Self {
            addr,
            queries,
            shutdown_tx: vec![udp_tx, tcp_tx],
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn name_server(&self) -> NameServerAddress {
        NameServerAddress::from_endpoint(self.addr)
    }

    pub fn queries(&self) -> Vec<(Question, Protocol)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl Drop for MockNameServer {
    fn drop(&mut self) {
        for tx in self.shutdown_tx.drain(..) {
            let _ = tx.send(());
        }
    }
}

fn record_query(queries: &Mutex<Vec<(Question, Protocol)>>, request: &Message, protocol: Protocol) {
    if let Some(question) = request.question.first() {
        queries.lock().unwrap().push((question.clone(), protocol));
    }
}

fn encode(reply: Reply) -> Option<Vec<u8>> {
    match reply {
        Reply::Message(message) => Some(message.to_bytes().unwrap()),
        Reply::Raw(bytes) => Some(bytes),
        Reply::Drop => None,
    }
}

async fn serve_udp(
    socket: UdpSocket,
    handler: Handler,
    queries: Arc<Mutex<Vec<(Question, Protocol)>>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            result = socket.recv_from(&mut buf) => {
                let Ok((len, peer)) = result else { continue };
                let Ok(request) = Message::from_bytes(&buf[..len]) else { continue };
                record_query(&queries, &request, Protocol::Udp);

                if let Some(bytes) = encode(handler(&request, Protocol::Udp)) {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        }
    }
}

async fn serve_tcp(
    listener: TcpListener,
    handler: Handler,
    queries: Arc<Mutex<Vec<(Question, Protocol)>>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            result = listener.accept() => {
                let Ok((stream, _)) = result else { continue };
                tokio::spawn(serve_connection(stream, handler.clone(), queries.clone()));
            }
        }
    }
}

/// Responses are written in two pieces so clients must accumulate reads.
async fn serve_connection(
    mut stream: TcpStream,
    handler: Handler,
    queries: Arc<Mutex<Vec<(Question, Protocol)>>>,
) {
    loop {
        let mut len = [0u8; 2];
        if stream.read_exact(&mut len).await.is_err() {
            return;
        }
        let mut query = vec![0u8; u16::from_be_bytes(len) as usize];
        if stream.read_exact(&mut query).await.is_err() {
            return;
        }
        let Ok(request) = Message::from_bytes(&query) else { return };
        record_query(&queries, &request, Protocol::Tcp);

        let Some(bytes) = encode(handler(&request, Protocol::Tcp)) else { return };
        let mut framed = (bytes.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&bytes);

        let split = framed.len().min(3);
        if stream.write_all(&framed[..split]).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if stream.write_all(&framed[split..]).await.is_err() {
            return;
        }
    }
}

/// Options with short timeouts so failing attempts finish quickly.
pub fn fast_options() -> ClientOptions {
    ClientOptions {
        connect_timeout: Duration::from_millis(300),
        send_timeout: Duration::from_millis(300),
        recv_timeout: Duration::from_millis(300),
        ..ClientOptions::default()
    }
}

pub fn loopback(last_octet: u8, port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), port)
}

pub fn a(name: &str, ip: &str) -> Record {
    Record::new(name, 300, RData::A(ip.parse().unwrap()))
}

pub fn aaaa(name: &str, ip: &str) -> Record {
    Record::new(name, 300, RData::Aaaa(ip.parse().unwrap()))
}

pub fn ns(zone: &str, host: &str) -> Record {
    Record::new(zone, 3600, RData::Ns(host.to_string()))
}

pub fn cname(name: &str, target: &str) -> Record {
    Record::new(name, 300, RData::Cname(target.to_string()))
}

pub fn mx(name: &str, preference: u16, exchange: &str) -> Record {
    Record::new(
        name,
        300,
        RData::Mx {
            preference,
            exchange: exchange.to_string(),
        },
    )
}

pub fn ptr(name: &str, host: &str) -> Record {
    Record::new(name, 300, RData::Ptr(host.to_string()))
}

pub fn soa(zone: &str) -> Record {
    Record::new(
        zone,
        300,
        RData::Soa(Soa {
            mname: format!("ns1.{}", zone),
            rname: format!("hostmaster.{}", zone),
            serial: 1,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum: 300,
        }),
    )
}

pub fn answer(request: &Message, records: Vec<Record>) -> Reply {
    let mut response = Message::response_to(request);
    response.answer = records;
    Reply::Message(response)
}

pub fn referral(request: &Message, authority: Vec<Record>, additional: Vec<Record>) -> Reply {
    let mut response = Message::response_to(request);
    response.authority = authority;
    response.additional = additional;
    Reply::Message(response)
}

pub fn negative(request: &Message, zone: &str) -> Reply {
    referral(request, vec![soa(zone)], Vec::new())
}

pub fn rcode(request: &Message, rcode: ResponseCode) -> Reply {
    let mut response = Message::response_to(request);
    response.header.rcode = rcode;
    Reply::Message(response)
}

pub fn qname(request: &Message) -> String {
    request.question[0].name.to_ascii_lowercase()
}

pub fn qtype(request: &Message) -> RecordType {
    request.question[0].qtype
}
