//! Scripted in-memory BLE adapter for tests.
//!
//! Reports exactly the advertisements, services and characteristics it was
//! built with, without filtering, so validation paths can be exercised.

use crate::domain::models::Advertisement;
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, AdvertisementStream, BleAdapter, BlePeripheral, CharacteristicInfo, ServiceInfo,
};
use crate::infrastructure::bluetooth::protocol::{READ_CHAR_UUID, SERVICE_UUID, WRITE_CHAR_UUID};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TARGET: &str = "AA:BB:CC:DD:EE:FF";

#[derive(Debug, Clone)]
struct Script {
    advertisements: Vec<Advertisement>,
    keep_scanning: bool,
    fail_enable: bool,
    fail_scan: bool,
    fail_connect: bool,
    services: Vec<Uuid>,
    characteristics: Vec<Uuid>,
    mtu: u16,
    fail_write_at: Option<usize>,
    write_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Recorder {
    writes: Mutex<Vec<Vec<u8>>>,
    write_attempts: AtomicUsize,
    stop_scan_calls: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

pub struct FakeAdapterBuilder {
    script: Script,
}

impl FakeAdapterBuilder {
    pub fn advertise(mut self, address: &str) -> Self {
        self.script.advertisements.push(Advertisement::new(address));
        self
    }

    pub fn advertise_named(mut self, address: &str, name: &str) -> Self {
        let mut adv = Advertisement::new(address);
        adv.local_name = Some(name.to_string());
        adv.rssi = Some(-40);
        self.script.advertisements.push(adv);
        self
    }

    /// Keep the scan stream open after the scripted advertisements.
    pub fn keep_scanning(mut self) -> Self {
        self.script.keep_scanning = true;
        self
    }

    pub fn fail_enable(mut self) -> Self {
        self.script.fail_enable = true;
        self
    }

    pub fn fail_scan(mut self) -> Self {
        self.script.fail_scan = true;
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.script.fail_connect = true;
        self
    }

    pub fn services(mut self, services: &[Uuid]) -> Self {
        self.script.services = services.to_vec();
        self
    }

    pub fn characteristics(mut self, characteristics: &[Uuid]) -> Self {
        self.script.characteristics = characteristics.to_vec();
        self
    }

    pub fn mtu(mut self, mtu: u16) -> Self {
        self.script.mtu = mtu;
        self
    }

    /// Fail the write attempt with this 0-based index.
    pub fn fail_write_at(mut self, attempt: usize) -> Self {
        self.script.fail_write_at = Some(attempt);
        self
    }

    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.script.write_delay = Some(delay);
        self
    }

    pub fn build(self) -> FakeAdapter {
        FakeAdapter {
            script: self.script,
            recorder: Arc::new(Recorder::default()),
        }
    }
}

pub struct FakeAdapter {
    script: Script,
    recorder: Arc<Recorder>,
}

impl FakeAdapter {
    pub fn builder() -> FakeAdapterBuilder {
        FakeAdapterBuilder {
            script: Script {
                advertisements: Vec::new(),
                keep_scanning: false,
                fail_enable: false,
                fail_scan: false,
                fail_connect: false,
                services: vec![SERVICE_UUID],
                characteristics: vec![WRITE_CHAR_UUID, READ_CHAR_UUID],
                mtu: 517,
                fail_write_at: None,
                write_delay: None,
            },
        }
    }

    /// Every fragment that reached the device, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.recorder.writes.lock().unwrap().clone()
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn stop_scan_calls(&self) -> usize {
        self.recorder.stop_scan_calls.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.recorder.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.recorder.disconnects.load(Ordering::SeqCst)
    }
}

fn scripted_failure(operation: &'static str) -> AdapterError {
    AdapterError::Operation {
        operation,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl BleAdapter for FakeAdapter {
    type Peripheral = FakePeripheral;

    async fn enable(&self) -> Result<(), AdapterError> {
        if self.script.fail_enable {
            return Err(AdapterError::Unavailable("adapter is powered off".to_string()));
        }
        Ok(())
    }

    async fn disable(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn scan(&self) -> Result<AdvertisementStream, AdapterError> {
        if self.script.fail_scan {
            return Err(scripted_failure("start scan"));
        }
        let scripted = futures::stream::iter(self.script.advertisements.clone());
        if self.script.keep_scanning {
            Ok(scripted.chain(futures::stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.recorder.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<Self::Peripheral, AdapterError> {
        if self.script.fail_connect {
            return Err(scripted_failure("connect"));
        }
        if !address.eq_ignore_ascii_case(TARGET) {
            return Err(AdapterError::UnknownPeripheral(address.to_string()));
        }
        self.recorder.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakePeripheral {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
        })
    }
}

pub struct FakePeripheral {
    script: Script,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl BlePeripheral for FakePeripheral {
    async fn discover_services(&self, _uuids: &[Uuid]) -> Result<Vec<ServiceInfo>, AdapterError> {
        Ok(self
            .script
            .services
            .iter()
            .map(|uuid| ServiceInfo { uuid: *uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        _uuids: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, AdapterError> {
        Ok(self
            .script
            .characteristics
            .iter()
            .map(|uuid| CharacteristicInfo {
                uuid: *uuid,
                service_uuid: service.uuid,
            })
            .collect())
    }

    async fn mtu(&self, _characteristic: &CharacteristicInfo) -> Result<u16, AdapterError> {
        Ok(self.script.mtu)
    }

    async fn write_without_response(
        &self,
        _characteristic: &CharacteristicInfo,
        data: &[u8],
    ) -> Result<(), AdapterError> {
        let attempt = self.recorder.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.script.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.fail_write_at == Some(attempt) {
            return Err(scripted_failure("write without response"));
        }
        self.recorder.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.recorder.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
