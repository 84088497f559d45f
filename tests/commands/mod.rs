//! Workflow tests, one module per menu action.

mod test_cleanup;
mod test_delete_deleted;
mod test_menu;
mod test_unsubscribe;
