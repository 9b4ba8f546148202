use embassy_time::Instant;

use crate::monitor::{MonitorFrame, MonitorLog, MonitorReceiver};

#[embassy_executor::task]
pub async fn run(receiver: MonitorReceiver<'static>) -> ! {
    let mut log = MonitorLog::new();

    loop {
        match receiver.receive().await {
            MonitorFrame::Event(event) => {
                let id = log.record(event, Instant::now());
                defmt::info!(
                    "monitor[{=u32}]: code={=u16:04x} {}",
                    id,
                    event.to_raw(),
                    defmt::Display2Format(&event)
                );
            }
            MonitorFrame::Line(line) => {
                defmt::info!("monitor: {=str}", line.as_str());
            }
        }
    }
}
