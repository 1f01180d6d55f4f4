//! Policy document rendering.

/// Which plugin the document is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Flash `crossdomain.xml` socket policy, NUL-terminated.
    Flex,
    /// Silverlight `clientaccesspolicy.xml`.
    Silverlight,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Flex => "flex",
            PolicyKind::Silverlight => "silverlight",
        }
    }

    /// Port the plugin queries when no policy was served in-band.
    pub fn default_port(&self) -> u16 {
        match self {
            PolicyKind::Flex => 843,
            PolicyKind::Silverlight => 943,
        }
    }

    /// Document allowing `hostname` to open sockets to `port`.
    pub fn render(&self, hostname: &str, port: u16) -> String {
        match self {
            PolicyKind::Flex => format!(
                "<?xml version=\"1.0\"?>\n\
                 <!DOCTYPE cross-domain-policy SYSTEM \"/xml/dtds/cross-domain-policy.dtd\">\n\
                 <cross-domain-policy>\n\
                 \x20 <site-control permitted-cross-domain-policies=\"master-only\"/>\n\
                 \x20 <allow-access-from domain=\"{hostname}\" to-ports=\"{port}\"/>\n\
                 </cross-domain-policy>\n\0"
            ),
            PolicyKind::Silverlight => format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
                 <access-policy>\n\
                 \x20 <cross-domain-access>\n\
                 \x20   <policy>\n\
                 \x20     <allow-from>\n\
                 \x20       <domain uri=\"http://{hostname}\"/>\n\
                 \x20     </allow-from>\n\
                 \x20     <grant-to>\n\
                 \x20       <socket-resource port=\"{port}\" protocol=\"tcp\"/>\n\
                 \x20     </grant-to>\n\
                 \x20   </policy>\n\
                 \x20 </cross-domain-access>\n\
                 </access-policy>\n"
            ),
        }
    }
}
