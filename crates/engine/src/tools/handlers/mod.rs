pub mod get_document;
pub mod search_checklist;

use crate::roles::ReviewRole;

use super::registry::ToolRegistry;

/// Register the tools a review role may call.
///
/// Every role can read the contract; only the compliance role searches the checklist.
pub fn register_role_tools(registry: &mut ToolRegistry, role: ReviewRole) {
    registry.register("get_document", get_document::handler());
    if role == ReviewRole::ChecklistCompliance {
        registry.register("search_checklist", search_checklist::handler());
    }
}
