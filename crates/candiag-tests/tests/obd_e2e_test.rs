//! OBD-II queries against a simulated ECU

use std::sync::Arc;
use std::time::Duration;

use candiag_core::{Dispatcher, LoopbackDevice};
use candiag_isotp::{Addressing, IsoTpConfig, IsoTpTransport};
use candiag_tests::{init_tracing, SimulatedEcu};
use candiag_uds::obd::{mode, OBD_FUNCTIONAL_ID, OBD_RESPONSE_ID};
use candiag_uds::{ObdClient, UdsError};
use pretty_assertions::assert_eq;

async fn setup(
    pids: &[u8],
) -> anyhow::Result<(ObdClient, Arc<Dispatcher>, tokio::task::JoinHandle<()>)> {
    let dispatcher = Arc::new(Dispatcher::new(LoopbackDevice::new()));
    let client = ObdClient::new(dispatcher.clone())?;
    let ecu_transport = IsoTpTransport::new(
        dispatcher.clone(),
        Addressing::normal(OBD_RESPONSE_ID, OBD_FUNCTIONAL_ID),
        IsoTpConfig::default(),
    )?;
    let ecu = Arc::new(SimulatedEcu::new(Arc::new(ecu_transport)).with_supported_pids(pids));
    dispatcher.start().await?;
    Ok((client, dispatcher, ecu.spawn()))
}

#[tokio::test]
async fn test_supported_pids_across_bitmaps() -> anyhow::Result<()> {
    init_tracing();
    let (client, dispatcher, server) = setup(&[0x0D, 0x01, 0x31, 0x05, 0x20, 0x0C, 0x2F]).await?;

    let pids = client.supported_pids(mode::CURRENT_DATA).await?;
    assert_eq!(pids, vec![0x01, 0x05, 0x0C, 0x0D, 0x20, 0x2F, 0x31]);

    server.abort();
    dispatcher.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_single_bitmap_request() -> anyhow::Result<()> {
    let (client, dispatcher, server) = setup(&[0x02, 0x04]).await?;

    let response = client.request(mode::VEHICLE_INFORMATION, Some(0x00)).await?;
    assert_eq!(response, Some(vec![0x49, 0x00, 0x50, 0x00, 0x00, 0x00]));
    assert_eq!(
        client.supported_pids(mode::VEHICLE_INFORMATION).await?,
        vec![0x02, 0x04]
    );

    server.abort();
    dispatcher.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_silent_bus_returns_nothing() -> anyhow::Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(LoopbackDevice::new()));
    let client = ObdClient::new(dispatcher.clone())?.with_timeout(Duration::from_millis(50));
    dispatcher.start().await?;

    assert_eq!(client.request(mode::CURRENT_DATA, Some(0x00)).await?, None);
    assert!(client.supported_pids(mode::CURRENT_DATA).await?.is_empty());
    assert!(matches!(
        client.supported_pids(mode::STORED_DTCS).await,
        Err(UdsError::InvalidRequest(_))
    ));

    dispatcher.stop().await?;
    Ok(())
}
