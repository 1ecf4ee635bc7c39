mod call_event_builder;
