//! Banner and header printing.

/// Print the application banner.
pub fn print_banner() {
    println!(
        "\n\x1b[1mshareclip\x1b[0m \x1b[2mv{}\x1b[0m \x1b[2m- peer-to-peer clipboard and file transfer\x1b[0m\n",
        env!("CARGO_PKG_VERSION")
    );
}
