#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod commands;
mod device_id;
mod eth;
mod network;
mod time;
mod tls_buffers;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// Connectivity loop period
const TICK_MS: u64 = 100;
/// Spacing between overdue checks that reach the alert policy
const OVERDUE_CHECK_MS: u32 = 60_000;
const LINK_CHANNEL_CAPACITY: usize = 4;

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use defmt::{error, info, warn};
    use embassy_futures::join::join3;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use potty_core::command::outside_overdue;
    use potty_core::{mono, Connectivity, LinkState, TimerBank};
    use potty_hal::WallClock;
    use rtic_sync::channel::{Receiver, Sender};

    use commands::CommandInbox;
    use network::{EthLink, HttpConfig, HttpsClient, NetworkConfig, SntpClient, SntpConfig};
    use time::RtcClock;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;
    type RngPeripheral = embassy_stm32::Peri<'static, peripherals::RNG>;

    type LinkStateTx = Sender<'static, LinkState, LINK_CHANNEL_CAPACITY>;
    type LinkStateRx = Receiver<'static, LinkState, LINK_CHANNEL_CAPACITY>;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Potty tracker starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (RNG clock)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);
        info!("Device UID: {}", device_id::uid_hex());

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        time::init_time_system(p.RTC);

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        let (link_tx, link_rx) = rtic_sync::make_channel!(LinkState, LINK_CHANNEL_CAPACITY);

        heartbeat::spawn(link_rx).ok();
        network_task::spawn(net_periph, p.RNG, link_tx).ok();

        (Shared {}, Local { led })
    }

    /// Heartbeat task
    ///
    /// Slow blink while connected, fast blink otherwise.
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context, mut link_rx: LinkStateRx) {
        info!("Heartbeat task started");
        let mut state = LinkState::Disconnected;
        loop {
            while let Ok(update) = link_rx.try_recv() {
                state = update;
            }
            let off_ms: u64 = if state == LinkState::Connected { 4900 } else { 400 };
            cx.local.led.set_high();
            Mono::delay(100.millis()).await;
            cx.local.led.set_low();
            Mono::delay(off_ms.millis()).await;
        }
    }

    /// Network task - runs the W5500 driver, the IP stack and the
    /// connectivity loop side by side
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        periph: NetworkPeripherals,
        rng_periph: RngPeripheral,
        link_tx: LinkStateTx,
    ) -> ! {
        use embassy_net::StackResources;
        use static_cell::StaticCell;

        info!("Network task started");

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let cs = Output::new(periph.cs, Level::High, Speed::VeryHigh);
        let reset = Output::new(periph.reset, Level::High, Speed::Low);
        let int = ExtiInput::new(periph.int, periph.exti, Pull::Up);

        let eth_periph = eth::EthPeripherals {
            spi,
            cs,
            reset,
            int,
        };

        let (device, w5500_runner) = match eth::init_w5500(eth_periph, device_id::mac_address()).await {
            Ok(parts) => parts,
            Err(e) => halt("Ethernet init failed", e).await,
        };

        // DHCP is started by the link supervisor, not at stack creation
        static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            embassy_net::Config::default(),
            RESOURCES.init(StackResources::new()),
            NetworkConfig::default().seed,
        );
        info!("Network stack initialized");

        let app_logic = run_connectivity(stack, rng_periph, link_tx);

        join3(w5500_runner.run(), net_runner.run(), app_logic).await;
    }

    fn now_ms() -> u32 {
        // Truncation is the intended wrap-around
        embassy_time::Instant::now().as_millis() as u32
    }

    async fn halt<E: defmt::Format>(what: &str, e: E) -> ! {
        error!("{}: {}", what, e);
        loop {
            Mono::delay(60.secs()).await;
        }
    }

    async fn run_connectivity(
        stack: embassy_net::Stack<'static>,
        rng_periph: RngPeripheral,
        mut link_tx: LinkStateTx,
    ) -> ! {
        use embassy_stm32::rng::Rng;

        let config = match network::config::connectivity_config() {
            Ok(config) => config,
            Err(e) => halt("Invalid build-time configuration", e).await,
        };
        info!("{} bot(s) configured", config.bots.len());

        let Some(tls) = tls_buffers::take() else {
            halt("TLS buffers", "already claimed").await
        };
        let rng = Rng::new(rng_periph, RngIrqs);
        info!("Hardware RNG initialized");

        let sntp = SntpClient::new(config.time.servers, SntpConfig::default());
        let mut conn = Connectivity::new(
            config,
            EthLink::new(stack),
            RtcClock::new(stack, sntp),
            HttpsClient::new(stack, rng, tls, HttpConfig::default()),
            embassy_time::Delay,
        );
        let mut inbox = CommandInbox::default();
        let mut timers = TimerBank::new();
        let mut reported_state = LinkState::Disconnected;
        let mut next_overdue_check = now_ms();

        conn.begin(now_ms());
        info!("Connectivity loop running ({} ms tick)", TICK_MS);

        loop {
            let now = now_ms();
            conn.tick(now, &mut inbox).await;

            let state = conn.link_state();
            if state != reported_state {
                reported_state = state;
                if state == LinkState::Connected {
                    conn.link_mut().log_config();
                }
                if link_tx.try_send(state).is_err() {
                    warn!("Heartbeat channel full");
                }
            }

            timers.observe(conn.clock().now_epoch());
            inbox.answer_pending(&mut conn, &mut timers, now).await;

            if conn.is_connected()
                && mono::deadline_reached(now, next_overdue_check)
                && outside_overdue(&timers)
            {
                next_overdue_check = now.wrapping_add(OVERDUE_CHECK_MS);
                let report = conn.broadcast_alert("Time to go outside!", now).await;
                info!("Overdue alert: {}", report.decision);
            }

            Mono::delay(TICK_MS.millis()).await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
