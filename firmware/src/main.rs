#![no_main]
#![no_std]

use datalogger_core::{acquisition::DataReady, LoggerConfig, LoggerState};
use defmt::Debug2Format;
use defmt_rtt as _;
use panic_probe as _;
use rtic::app;
use rtic_monotonics::systick::{ExtU64, Systick};
use rtic_monotonics::Monotonic;
use smoltcp::iface::SocketStorage;
use stm32_eth::{dma::EthernetDMA, EthPins, Parts, PartsIn};
use stm32f7xx_hal::{
    gpio::{ExtiPin, Output, Pin, Speed},
    i2c::{BlockingI2c, Mode},
    pac,
    prelude::*,
    serial::{self, Serial},
    spi::Spi,
};

use datalogger_firmware::{
    ads1115::{self, Ads1115},
    board::{Board, I2cBus},
    delay::BusyDelay,
    display::Display,
    network::{DmaResources, EthernetLink},
    panel::{Buttons, Buzzer, SerialOut},
    rtc::Ds1302,
    storage::SdStorage,
};

/// Raised by the ALERT/RDY interrupt, consumed by the main loop
static DATA_READY: DataReady = DataReady::new();

static LOGGER_CONFIG: &[u8] = include_bytes!("../logger-config.json");

/// ALERT/RDY of the ADS1115 is on PC6
const ADC_ALERT_LINE: u32 = 6;

defmt::timestamp!("{=u64:ms}", Systick::now().ticks());

#[app(device = stm32f7xx_hal::pac, dispatchers = [CAN1_RX0])]
mod app {
    use super::*;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        board: Board,
        state: LoggerState,
    }

    #[init(local = [
        dma_resources: DmaResources = DmaResources::new(),
        sockets: [SocketStorage<'static>; 1] = [SocketStorage::EMPTY; 1],
        dma: core::cell::OnceCell<EthernetDMA<'static, 'static>> = core::cell::OnceCell::new(),
    ])]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        let mut rcc = p.RCC.constrain();
        // Setup clocks
        let clocks = rcc.cfgr.sysclk(216.MHz()).hclk(216.MHz()).freeze();
        defmt::println!("Clocks: {:?}", Debug2Format(&clocks));

        // Setup systick to be used for delays
        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.sysclk().to_Hz(), systick_token);

        // The core logs through `log`
        log_to_defmt::setup();

        let config = LoggerConfig::from_json(LOGGER_CONFIG).unwrap_or_else(|e| {
            defmt::error!("Invalid logger-config.json: {}", e);
            LoggerConfig::default()
        });

        let delay = BusyDelay::new(clocks.sysclk());

        let gpioa = p.GPIOA.split();
        let gpiob = p.GPIOB.split();
        let gpioc = p.GPIOC.split();
        let gpiod = p.GPIOD.split();
        let gpioe = p.GPIOE.split();
        let gpiof = p.GPIOF.split();
        let gpiog = p.GPIOG.split();

        // I2C1, shared by the ADS1115 and the display
        let i2c_bus = {
            let scl = gpiob.pb8.into_alternate_open_drain();
            let sda = gpiob.pb9.into_alternate_open_drain();
            let i2c: I2cBus = BlockingI2c::i2c1(
                p.I2C1,
                (scl, sda),
                Mode::fast(400.kHz()),
                &clocks,
                &mut rcc.apb1,
                50_000,
            );
            shared_bus::new_cortexm!(I2cBus = i2c)
                .unwrap_or_else(|| defmt::panic!("I2C bus already created"))
        };

        let adc = {
            let mut syscfg = p.SYSCFG;
            let mut alert = gpioc.pc6.into_pull_up_input();
            alert.make_interrupt_source(&mut syscfg, &mut rcc.apb2);
            Ads1115::new(
                i2c_bus.acquire_i2c(),
                ads1115::DEFAULT_ADDRESS,
                alert,
                p.EXTI,
            )
        };

        let display = Display::new(i2c_bus.acquire_i2c());

        // SD card on SPI3
        let storage = {
            let spi = Spi::new(
                p.SPI3,
                (
                    gpioc.pc10.into_alternate(),
                    gpioc.pc11.into_alternate(),
                    gpioc.pc12.into_alternate(),
                ),
            )
            .enable::<u8>(
                embedded_hal::spi::MODE_0,
                400.kHz(),
                &clocks,
                &mut rcc.apb1,
            );
            let mut cs = gpiod.pd14.into_push_pull_output();
            cs.set_high();
            SdStorage::new(spi, cs, delay)
        };

        let clock = Ds1302::new(
            gpioe.pe4.into_push_pull_output(),
            gpioe.pe5.into_push_pull_output(),
            gpioe.pe6.into_dynamic(),
            delay,
        );

        // Diagnostic port
        let (tx, rx) = Serial::new(
            p.USART3,
            (gpiod.pd8.into_alternate(), gpiod.pd9.into_alternate()),
            &clocks,
            serial::Config {
                baud_rate: 250_000.bps(),
                ..Default::default()
            },
        )
        .split();

        let buttons = Buttons::new(
            gpiof.pf12.into_pull_down_input(),
            gpiof.pf13.into_pull_down_input(),
            gpiof.pf14.into_pull_down_input(),
            rx,
        );

        let buzzer = Buzzer::new(
            gpiog.pg2.into_push_pull_output(),
            gpiob.pb14.into_push_pull_output(),
            delay,
        );

        // Setup Ethernet
        let network = {
            let ref_clk = gpioa.pa1.into_floating_input();
            let crs = gpioa.pa7.into_floating_input();
            let tx_d1 = gpiob.pb13.into_floating_input();
            let rx_d0 = gpioc.pc4.into_floating_input();
            let rx_d1 = gpioc.pc5.into_floating_input();
            let tx_en = gpiog.pg11.into_floating_input();
            let tx_d0 = gpiog.pg13.into_floating_input();

            let (mdio, mdc) = (
                gpioa.pa2.into_alternate().set_speed(Speed::VeryHigh),
                gpioc.pc1.into_alternate().set_speed(Speed::VeryHigh),
            );

            let eth_pins = EthPins {
                ref_clk,
                crs,
                tx_en,
                tx_d0,
                tx_d1,
                rx_d0,
                rx_d1,
            };

            let ethernet = PartsIn {
                dma: p.ETHERNET_DMA,
                mac: p.ETHERNET_MAC,
                mmc: p.ETHERNET_MMC,
                ptp: p.ETHERNET_PTP,
            };

            let DmaResources { rx_ring, tx_ring } = cx.local.dma_resources;

            let Parts { dma, mac, .. } = stm32_eth::new_with_mii(
                ethernet, rx_ring, tx_ring, clocks, eth_pins, mdio, mdc,
            )
            .unwrap_or_else(|_| defmt::panic!("Unable to set up ethernet"));

            if cx.local.dma.set(dma).is_err() {
                defmt::panic!("Unable to set DMA");
            }
            let dma = cx
                .local
                .dma
                .get_mut()
                .unwrap_or_else(|| defmt::panic!("DMA not set"));

            EthernetLink::new(mac, dma, cx.local.sockets)
        };

        let board = Board {
            adc,
            display,
            storage,
            network,
            clock,
            buttons,
            serial: SerialOut::new(tx),
            buzzer,
        };

        blinky::spawn(gpiob.pb7.into_push_pull_output())
            .unwrap_or_else(|_| defmt::panic!("Failed to start blinky"));

        defmt::info!(
            "Starting in {} on {} at {} SPS",
            config.output_mode,
            config.channel,
            config.sample_rate
        );

        (
            Shared {},
            Local {
                board,
                state: LoggerState::new(config),
            },
        )
    }

    /// The main loop: menu, acquisition and network polling, never blocks
    /// except for the feedback cues
    #[idle(local = [board, state])]
    fn idle(cx: idle::Context) -> ! {
        let board = cx.local.board;
        let state = cx.local.state;

        if let Err(e) = state.start(&DATA_READY, &mut board.devices()) {
            defmt::panic!("Startup failed: {}", e);
        }

        loop {
            state.tick(&DATA_READY, &mut board.devices());
            board.network.poll();
        }
    }

    /// Conversion ready on the ADS1115
    #[task(binds = EXTI9_5, priority = 2)]
    fn on_adc_ready(_cx: on_adc_ready::Context) {
        let exti = unsafe { &*pac::EXTI::ptr() };
        exti.pr.write(|w| unsafe { w.bits(1 << ADC_ALERT_LINE) });

        DATA_READY.signal();
    }

    /// Heartbeat on the green LED
    #[task(priority = 1)]
    async fn blinky(_cx: blinky::Context, mut led: Pin<'B', 7, Output>) {
        loop {
            led.set_high();
            Systick::delay(500u64.millis()).await;
            led.set_low();
            Systick::delay(500u64.millis()).await;
        }
    }
}
