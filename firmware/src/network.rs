use datalogger_core::{peripherals::Network, AccessPointConfig};
use ieee802_3_miim::{
    phy::{PhySpeed, LAN8742A},
    Phy,
};
use rtic_monotonics::{systick::Systick, Monotonic};
use smoltcp::{
    iface::{Config, Interface, SocketSet, SocketStorage},
    wire::{EthernetAddress, IpAddress, IpCidr, Ipv4Address},
};
use stm32_eth::{
    dma::{EthernetDMA, RxRingEntry, TxRingEntry},
    mac,
    mac::EthernetMACWithMii,
};
use stm32f7xx_hal::{
    gpio::{Alternate, Pin},
    signature::Uid,
};

pub type Mac = EthernetMACWithMii<Pin<'A', 2, Alternate<11>>, Pin<'C', 1, Alternate<11>>>;

/// How often the PHY is asked for a link before giving up
const LINK_POLLS: u32 = 100_000;

pub struct DmaResources {
    pub rx_ring: [RxRingEntry; 2],
    pub tx_ring: [TxRingEntry; 2],
}

impl DmaResources {
    pub const fn new() -> Self {
        Self {
            rx_ring: [RxRingEntry::new(), RxRingEntry::new()],
            tx_ring: [TxRingEntry::new(), TxRingEntry::new()],
        }
    }
}

/// The wired stand-in for the WiFi access point
///
/// Takes the access point's address, answers ping on it and reports the link
/// state to the status page.
pub struct EthernetLink {
    phy: LAN8742A<Mac>,
    dma: &'static mut EthernetDMA<'static, 'static>,
    interface: Interface,
    sockets: SocketSet<'static>,
}

impl EthernetLink {
    pub fn new(
        mac: Mac,
        dma: &'static mut EthernetDMA<'static, 'static>,
        sockets: &'static mut [SocketStorage<'static>],
    ) -> Self {
        let mut phy = LAN8742A::new(mac, 0);
        phy.phy_init();

        let mac_address = generate_mac_address();
        let cfg = Config::new(EthernetAddress(mac_address).into());
        let interface = {
            let mut device = &mut *dma;
            Interface::new(cfg, &mut device, now())
        };

        defmt::info!("MAC address: {:02x}", mac_address);

        Self {
            phy,
            dma,
            interface,
            sockets: SocketSet::new(sockets),
        }
    }

    /// Let smoltcp handle its state machines
    pub fn poll(&mut self) {
        self.interface.poll(now(), &mut self.dma, &mut self.sockets);
    }

    /// Wait a bounded time for the link and set the speed
    fn link_up(&mut self) -> bool {
        defmt::info!("Waiting for link up.");

        if !(0..LINK_POLLS).any(|_| self.phy.phy_link_up()) {
            defmt::warn!("No link.");
            return false;
        }

        defmt::info!("Link up.");

        if let Some(speed) = self.phy.link_speed().map(|s| match s {
            PhySpeed::HalfDuplexBase10T => mac::Speed::HalfDuplexBase10T,
            PhySpeed::FullDuplexBase10T => mac::Speed::FullDuplexBase10T,
            PhySpeed::HalfDuplexBase100Tx => mac::Speed::HalfDuplexBase100Tx,
            PhySpeed::FullDuplexBase100Tx => mac::Speed::FullDuplexBase100Tx,
        }) {
            self.phy.get_miim().set_speed(speed);
            defmt::info!("Detected link speed: {}", speed);
        } else {
            defmt::warn!("Failed to detect link speed.");
        }

        true
    }
}

impl Network for EthernetLink {
    fn start_access_point(&mut self, config: &AccessPointConfig) -> bool {
        let [a, b, c, d] = config.ip;
        let prefix_len = u32::from_be_bytes(config.subnet).count_ones() as u8;

        self.interface.update_ip_addrs(|addrs| {
            addrs.clear();
            if addrs
                .push(IpCidr::new(IpAddress::v4(a, b, c, d), prefix_len))
                .is_err()
            {
                defmt::warn!("No room for the access point address");
            }
        });

        let [a, b, c, d] = config.gateway;
        if self
            .interface
            .routes_mut()
            .add_default_ipv4_route(Ipv4Address::new(a, b, c, d))
            .is_err()
        {
            defmt::warn!("Failed to set the default route");
        }

        defmt::info!(
            "Access point {=str} on {}",
            config.ssid.as_str(),
            self.interface.ip_addrs()
        );

        self.link_up()
    }
}

fn now() -> smoltcp::time::Instant {
    // Systick runs at 1 kHz
    let now_millis = Systick::now().ticks();
    smoltcp::time::Instant::from_millis(i64::try_from(now_millis).unwrap_or(i64::MAX))
}

/// Generate a mac based on the UID of the chip.
///
/// *Note: This is not the proper way to do it.
/// You're supposed to buy a mac address or buy a phy that includes a mac and
/// use that one*
pub fn generate_mac_address() -> [u8; 6] {
    let mut hasher = adler::Adler32::new();

    // Form the basis of our OUI octets
    let bin_name = env!("CARGO_CRATE_NAME").as_bytes();
    hasher.write_slice(bin_name);
    let oui = hasher.checksum().to_ne_bytes();

    // Form the basis of our NIC octets
    let uid: [u8; 12] =
        unsafe { core::mem::transmute_copy::<_, [u8; core::mem::size_of::<Uid>()]>(Uid::get()) };
    hasher.write_slice(&uid);
    let nic = hasher.checksum().to_ne_bytes();

    // To make it adhere to EUI-48, we set it to be a unicast locally administered
    // address
    [
        oui[0] & 0b1111_1100 | 0b0000_0010,
        oui[1],
        oui[2],
        nic[0],
        nic[1],
        nic[2],
    ]
}
