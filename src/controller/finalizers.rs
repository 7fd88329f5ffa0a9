//! The finalizer marker blocking hard deletion of a `SupabaseInstance`
//! until cleanup completes.

pub const SUPABASE_INSTANCE_FINALIZER: &str = "supacontrol.io/finalizer";
