pub mod reload_worker;
