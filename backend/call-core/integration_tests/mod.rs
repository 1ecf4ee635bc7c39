mod config;
mod contacts;
mod crm_client;
mod helpers;
mod orchestrator;
