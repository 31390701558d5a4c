//! Tool units the gateway registers at startup.

pub mod summary;

use relay_core::ToolUnit;

pub use summary::ConversationSummary;

/// Every built-in tool unit, in registration order.
pub fn builtin(webhook_url: &str) -> Vec<ToolUnit> {
    vec![summary::unit(webhook_url)]
}

#[cfg(test)]
mod tests {
    use relay_core::Registry;

    use super::*;

    #[test]
    fn builtin_units_load_into_a_registry() {
        let registry = Registry::load(builtin("http://localhost/hook")).unwrap();

        assert_eq!(registry.function_names(), ["conversation_summary_request"]);
        assert_eq!(registry.schemas().len(), 1);
        assert_eq!(registry.schemas()[0].name(), "conversation_summary_request");
    }
}
