mod lifecycle;
mod registry;
mod session;

#[cfg(test)]
mod testutil;

use async_trait::async_trait;

use ferron_module_api::RuntimeApi;

pub use registry::{Registry, RegistryConfig};
pub use session::Session;

#[async_trait]
impl RuntimeApi for Registry {
  async fn addbackend(&self, name: &str) -> i32 {
    match self.create_backend(name).await {
      Ok(_) => 0,
      Err(e) => {
        self.log_failure(&format!("addbackend {name}"), &e).await;
        -1
      }
    }
  }

  async fn delbackend(&self, name: &str) -> i32 {
    match self.delete_backend(name).await {
      Ok(()) => 0,
      Err(e) => {
        self.log_failure(&format!("delbackend {name}"), &e).await;
        -1
      }
    }
  }

  async fn addserver(&self, backend_name: &str, server_name: &str, addr: &str, cookie: &str) -> i32 {
    let parsed_addr = match parse_server_addr(addr) {
      Ok(a) => a,
      Err(_) => {
        self
          .log_failure(&format!("addserver {backend_name}/{server_name}"), &anyhow::anyhow!("'{addr}' is not a valid address"))
          .await;
        return -1;
      }
    };
    match self.create_server(backend_name, server_name, parsed_addr, cookie).await {
      Ok(_) => 0,
      Err(e) => {
        self.log_failure(&format!("addserver {backend_name}/{server_name}"), &e).await;
        -1
      }
    }
  }

  async fn delserver(&self, backend_name: &str, server_name: &str) -> i32 {
    match self.delete_server(backend_name, server_name).await {
      Ok(()) => 0,
      Err(e) => {
        self.log_failure(&format!("delserver {backend_name}/{server_name}"), &e).await;
        -1
      }
    }
  }

  async fn add_switch_entry(&self, frontend_name: &str, backend_name: &str, domain: &str) -> i32 {
    match self.add_switch_entry(frontend_name, backend_name, domain).await {
      Ok(()) => 0,
      Err(e) => {
        self.log_failure(&format!("add_switch_entry {frontend_name}->{backend_name}"), &e).await;
        -1
      }
    }
  }
}

impl Registry {
  async fn log_failure(&self, what: &str, err: &anyhow::Error) {
    self.log.warning(&format!("{what} failed: {err}")).await;
  }
}

/// Resolves an `addserver` address string into a socket address, defaulting
/// to port 80 when `addr` carries no port of its own — the behavior of
/// `newsrv->addr.sin_port = sk->sin_port ? sk->sin_port : htons(80)`.
fn parse_server_addr(addr: &str) -> anyhow::Result<std::net::SocketAddr> {
  if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
    return Ok(sock);
  }
  let ip: std::net::IpAddr = addr.parse().map_err(|_| anyhow::anyhow!("'{addr}' is not a valid address"))?;
  Ok(std::net::SocketAddr::new(ip, 80))
}

#[cfg(test)]
mod runtime_api_tests {
  use ferron_module_api::RuntimeApi;

  use crate::testutil::test_registry;

  #[tokio::test]
  async fn addbackend_returns_zero_on_success_and_nonzero_on_a_repeat() {
    let reg = test_registry();
    assert_eq!(reg.addbackend("api").await, 0);
    assert_ne!(reg.addbackend("api").await, 0);
  }

  #[tokio::test]
  async fn addserver_rejects_an_unparseable_address() {
    let reg = test_registry();
    reg.addbackend("api").await;
    assert_ne!(reg.addserver("api", "s1", "not-an-address", "c1").await, 0);
  }

  #[tokio::test]
  async fn addserver_defaults_to_port_80_when_none_given() {
    let reg = test_registry();
    reg.addbackend("api").await;
    assert_eq!(reg.addserver("api", "s1", "10.0.0.1", "c1").await, 0);
    let srv = reg.findserver("api", "s1").await.unwrap();
    assert_eq!(srv.addr.port(), 80);
  }

  #[tokio::test]
  async fn full_mutation_round_trip_through_the_runtime_api() {
    let reg = test_registry();
    assert_eq!(reg.addbackend("api").await, 0);
    assert_eq!(reg.addserver("api", "s1", "10.0.0.1:80", "c1").await, 0);
    assert_eq!(reg.delserver("api", "s1").await, 0);
    assert_eq!(reg.delbackend("api").await, 0);
  }
}
