pub mod counter_repair;
