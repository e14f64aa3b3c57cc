use libchat::{Message, PeerDirectory};

const LOGO: &str = include_str!("../../../assets/logo.txt");

pub const NOT_SELECTED_PLACEHOLDER: &str = "<not selected>";

pub fn welcome_banner(name: &str) -> String {
    format!("{LOGO}              Hi, {name}\n              Welcome to Chat!\n")
}

/// The interactive prompt, showing who the next message goes to.
pub fn prompt(selected: Option<&str>) -> String {
    format!("  to [{}] <<< ", selected.unwrap_or(NOT_SELECTED_PLACEHOLDER))
}

pub fn inbound_line(message: &Message) -> String {
    format!("\nfrom [{}] >>> {}", message.user, message.text)
}

/// One `name ==> address` line per peer, ordered by name.
pub fn peer_listing(directory: &PeerDirectory) -> String {
    directory
        .sorted()
        .into_iter()
        .map(|(name, address)| format!("{name} ==> {address}"))
        .collect::<Vec<_>>()
        .join("\n")
}
