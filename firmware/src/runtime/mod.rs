use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use embassy_sync::channel::Channel;

use receiver_core::config::ReceiverConfig;
use receiver_core::service::Receiver;

use crate::clock::FirmwareInstant;
use crate::hw::power::ExtPowerAdc;
use crate::hw::tuner::Si4707;
use crate::hw::{BiColorLed, ReceiverOutputs, UserButton};
use crate::monitor::{MonitorQueue, QueueMonitor};

mod monitor_task;
mod service_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

static MONITOR_QUEUE: MonitorQueue = Channel::new();
static CONFIG: ReceiverConfig = ReceiverConfig::DEFAULT;

/// The fully wired receiver type driven by the service task.
pub type BoardReceiver = Receiver<
    'static,
    FirmwareInstant,
    Si4707<'static>,
    ReceiverOutputs<'static>,
    ExtPowerAdc<'static>,
    QueueMonitor<'static>,
>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB0,
        PB1,
        PB6,
        PB7,
        I2C1,
        ADC1,
        ..
    } = hal::init(config);

    let bus = I2c::new_blocking(I2C1, PB6, PB7, Hertz(100_000), Default::default());
    let mut tuner = Si4707::new(bus, Output::new(PA4, Level::Low, Speed::Low));
    if let Err(error) = tuner.power_up() {
        // Leave fault handling to the supervisor: the first scan latches
        // Fault and the signal LED reports it.
        defmt::warn!("tuner power-up failed: {}", defmt::Display2Format(&error));
    }

    let outputs = ReceiverOutputs::new(
        Output::new(PA5, Level::Low, Speed::Low),
        BiColorLed::new(
            Output::new(PA6, Level::Low, Speed::Low),
            Output::new(PA7, Level::Low, Speed::Low),
        ),
        BiColorLed::new(
            Output::new(PB0, Level::Low, Speed::Low),
            Output::new(PB1, Level::Low, Speed::Low),
        ),
        Output::new(PA8, Level::Low, Speed::Low),
    );

    let mut adc = Adc::new(ADC1);
    adc.set_sample_time(SampleTime::CYCLES160_5);
    let power = ExtPowerAdc::new(adc, PA0);

    let button = UserButton::new(Input::new(PA1, Pull::Up));

    let receiver = Receiver::new(
        &CONFIG,
        tuner,
        outputs,
        power,
        QueueMonitor::new(MONITOR_QUEUE.sender()),
    );

    spawner
        .spawn(service_task::run(receiver, button))
        .expect("failed to spawn service task");
    spawner
        .spawn(monitor_task::run(MONITOR_QUEUE.receiver()))
        .expect("failed to spawn monitor task");

    core::future::pending::<()>().await;
}
