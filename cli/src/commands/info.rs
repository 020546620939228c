//! Info command implementation.

use shareclip_core::protocol::constants::DEFAULT_PORT;
use shareclip_core::DeviceIdentity;

/// Display device information.
pub fn show_info(name: String) {
    let identity = DeviceIdentity::new(name);

    println!("\n\x1b[1mShareclip Device Info\x1b[0m");
    println!("═══════════════════════════════════════");
    println!("\x1b[1mName:\x1b[0m {}", identity.name);
    println!("\x1b[1mID:\x1b[0m   {}", identity.id);
    println!("\x1b[1mPort:\x1b[0m {}", DEFAULT_PORT);

    println!("\n\x1b[1mLocal IPs:\x1b[0m");
    for ip in shareclip_core::discovery::get_local_ips() {
        println!("  • {}", ip);
    }
    println!();
}
